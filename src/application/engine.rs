use super::service::PaymentService;
use crate::domain::audit::AuditSubtype;
use crate::domain::event::{EventType, PaymentEvent};
use crate::domain::fee::PaymentFee;
use crate::domain::payment::{Payment, UserId};
use crate::error::Result;
use std::sync::Arc;
use tracing::warn;

/// Replays recorded payment events against the payment store.
///
/// Each event is applied through the matching named transition and persisted
/// before the next one is processed, so events for the same payment are applied
/// in input order.
pub struct PaymentEngine {
    service: Arc<PaymentService>,
}

impl PaymentEngine {
    /// Creates a new `PaymentEngine` on top of a payment service.
    pub fn new(service: Arc<PaymentService>) -> Self {
        Self { service }
    }

    /// Applies one event.
    ///
    /// Duplicate `create` events and events for unknown payments are ignored.
    pub async fn process_event(&self, event: PaymentEvent) -> Result<()> {
        let now = event.at.unwrap_or_else(|| self.service.now());

        if event.event == EventType::Create {
            if self
                .service
                .get_payment_by_local_identifier(&event.local_id)
                .await?
                .is_some()
            {
                warn!(local_id = %event.local_id, "Ignoring duplicate payment");
                return Ok(());
            }
            let mut payment = self
                .service
                .create_in_progress_payment(UserId(event.user.unwrap_or_default()), &event.local_id);
            payment.set_created(Some(now));
            apply_details(&mut payment, &event);
            self.service
                .persist_with_event(&mut payment, AuditSubtype::Payment, "Payment created", &[])
                .await?;
            return Ok(());
        }

        let Some(mut payment) = self
            .service
            .get_payment_by_local_identifier(&event.local_id)
            .await?
        else {
            warn!(local_id = %event.local_id, event = ?event.event, "Ignoring event for unknown payment");
            return Ok(());
        };

        match event.event {
            EventType::Create => {}
            EventType::Fee => {
                let Some(payment_id) = payment.id() else {
                    return Ok(());
                };
                let mut fee = PaymentFee::new(payment_id);
                fee.set_amount(event.amount.unwrap_or_default())
                    .set_tax_percent(event.tax_percent.unwrap_or_default())
                    .set_currency(event.currency.as_deref().unwrap_or(payment.currency()))
                    .set_title(event.title.as_deref().unwrap_or_default())
                    .set_fine_id(event.fine_id.clone().unwrap_or_default());
                self.service.add_fee(&mut fee).await?;
                return Ok(());
            }
            EventType::Paid => {
                payment.apply_payment_paid_status_at(now);
            }
            EventType::Canceled => {
                payment.apply_canceled_status();
            }
            EventType::PaymentFailed => {
                payment.apply_payment_failed_status();
            }
            EventType::RegistrationStarted => {
                payment.apply_registration_started_status_at(now);
            }
            EventType::Registered => {
                payment.apply_registered_status_at(now);
            }
            EventType::RegistrationFailed => {
                payment.apply_registration_failed_status(event.message.clone().unwrap_or_default());
            }
            EventType::RegistrationExpired => {
                payment.apply_registration_expired_status();
            }
            EventType::Reported => {
                payment.apply_reported_status_at(now);
            }
            EventType::FinesUpdated => {
                payment.apply_fines_updated_status();
            }
            EventType::RegistrationResolved => {
                payment.apply_registration_resolved_status_at(now);
            }
        }

        self.service.persist(&mut payment).await?;
        Ok(())
    }

    /// Returns the final state of all payments.
    pub async fn into_results(self) -> Result<Vec<Payment>> {
        self.service.all_payments().await
    }
}

fn apply_details(payment: &mut Payment, event: &PaymentEvent) {
    if let Some(cat_username) = &event.cat_username {
        payment.set_cat_username(cat_username.as_str());
    }
    if let Some(source_ils) = &event.source_ils {
        payment.set_source_ils(source_ils.as_str());
    }
    if let Some(amount) = event.amount {
        payment.set_amount(amount);
    }
    if let Some(currency) = &event.currency {
        payment.set_currency(currency.as_str());
    }
}
