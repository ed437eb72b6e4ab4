use super::service::PaymentService;
use crate::domain::audit::AuditSubtype;
use crate::domain::payment::Payment;
use crate::domain::ports::{IlsGatewayBox, RegistrationOutcome, RegistrationRequest};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, error, info};

const FINES_UPDATED_EVENT: &str = "Registration failed: fines updated";

/// How the ILS treats payments that do not match the current fine balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationConfig {
    /// The paid amount must equal the payable amount.
    pub exact_balance_required: bool,
    /// The paid amount must not exceed the payable amount.
    pub credit_unsupported: bool,
    /// The ILS accepts a list of the fines being paid.
    pub select_fines: bool,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            exact_balance_required: true,
            credit_unsupported: false,
            select_fines: false,
        }
    }
}

/// Marks paid payments as paid in the ILS and records the outcome on the payment.
///
/// Each step is persisted together with an audit event, so a registration that
/// stops halfway can be traced from the payment's event trail.
pub struct RegistrationService {
    service: Arc<PaymentService>,
    ils: IlsGatewayBox,
    config: RegistrationConfig,
}

impl RegistrationService {
    /// Creates a registration service.
    ///
    /// # Arguments
    ///
    /// * `service` - Payment storage shared with the rest of the application.
    /// * `ils` - Gateway to the library system that holds the patron's fines.
    /// * `config` - Balance rules the ILS applies to incoming payments.
    pub fn new(service: Arc<PaymentService>, ils: IlsGatewayBox, config: RegistrationConfig) -> Self {
        Self {
            service,
            ils,
            config,
        }
    }

    /// Registers `payment` with the ILS.
    ///
    /// The payment is reloaded first. If another registration started less than
    /// the registration timeout ago, nothing is done. Otherwise the start is
    /// persisted, the payable balance is checked when the ILS requires it, and
    /// the ILS is asked to mark the fines as paid.
    ///
    /// Returns `Ok(true)` when the ILS accepted the payment. Every other outcome,
    /// including an error from the gateway, is recorded on the payment and
    /// persisted before returning `Ok(false)`. `Err` is only returned when
    /// storage fails.
    ///
    /// # Arguments
    ///
    /// * `payment` - A paid payment. It is updated in place with the new status.
    pub async fn register_payment(&self, payment: &mut Payment) -> Result<bool> {
        self.service.refresh(payment).await?;

        let now = self.service.now();
        if payment.is_registration_in_progress_at(now) {
            debug!(
                local_identifier = payment.local_identifier(),
                started = ?payment.registration_started(),
                "Payment already being registered"
            );
            if payment.id().is_some() {
                self.service
                    .add_payment_event(
                        payment,
                        AuditSubtype::PaymentRegistration,
                        "Payment already being registered",
                        &[],
                    )
                    .await?;
            }
            return Ok(false);
        }

        payment.apply_registration_started_status_at(now);
        self.service
            .persist_with_event(payment, AuditSubtype::PaymentRegistration, "Started registration", &[])
            .await?;

        let fine_ids = match payment.id() {
            Some(id) => self.service.fine_ids_for_payment(id).await?,
            None => Vec::new(),
        };

        if self.config.exact_balance_required || self.config.credit_unsupported {
            let payable = self
                .ils
                .payable_amount(payment.source_ils(), payment.cat_username(), &fine_ids)
                .await;
            match payable {
                Err(e) => {
                    error!(local_identifier = payment.local_identifier(), "Failed to process fine details: {e}");
                    payment.apply_registration_failed_status("Failed to process fine details");
                    self.service
                        .persist_with_event(
                            payment,
                            AuditSubtype::PaymentRegistration,
                            "Registration failed: could not process fine details",
                            &[("error", e.to_string().as_str())],
                        )
                        .await?;
                    return Ok(false);
                }
                Ok(Some(payable)) if payable != 0 && self.balance_changed(payment.amount(), payable) => {
                    error!(
                        local_identifier = payment.local_identifier(),
                        paid = payment.amount(),
                        payable,
                        "Payable sum updated"
                    );
                    payment.apply_fines_updated_status();
                    self.service
                        .persist_with_event(payment, AuditSubtype::PaymentRegistration, FINES_UPDATED_EVENT, &[])
                        .await?;
                    return Ok(false);
                }
                Ok(_) => {}
            }
        }

        let request = RegistrationRequest {
            payment_id: payment.id(),
            source_ils: payment.source_ils().to_string(),
            cat_username: payment.cat_username().to_string(),
            amount: payment.amount(),
            local_identifier: payment.local_identifier().to_string(),
            remote_identifier: payment.remote_identifier().map(str::to_string),
            fine_ids: self.config.select_fines.then_some(fine_ids),
        };

        debug!(local_identifier = payment.local_identifier(), "Start marking fees as paid");
        let outcome = match self.ils.register_payment(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = e.to_string();
                error!(
                    local_identifier = payment.local_identifier(),
                    cat_username = payment.cat_username(),
                    "Payment registration error: {reason}"
                );
                payment.apply_registration_failed_status(reason.as_str());
                self.service
                    .persist_with_event(
                        payment,
                        AuditSubtype::PaymentRegistration,
                        "Registration failed",
                        &[("error", reason.as_str())],
                    )
                    .await?;
                return Ok(false);
            }
        };
        debug!(local_identifier = payment.local_identifier(), ?outcome, "Done marking fees as paid");

        match outcome {
            RegistrationOutcome::Registered => {
                payment.apply_registered_status_at(self.service.now());
                self.service
                    .persist_with_event(payment, AuditSubtype::PaymentRegistration, "Successfully registered", &[])
                    .await?;
                info!(local_identifier = payment.local_identifier(), "Registration successful");
                Ok(true)
            }
            RegistrationOutcome::FinesChanged => {
                payment.apply_fines_updated_status();
                self.service
                    .persist_with_event(payment, AuditSubtype::PaymentRegistration, FINES_UPDATED_EVENT, &[])
                    .await?;
                Ok(false)
            }
            RegistrationOutcome::Failed(reason) => {
                error!(local_identifier = payment.local_identifier(), "Registration failed: {reason}");
                payment.apply_registration_failed_status(format!("Failed to mark fees paid: {reason}"));
                self.service
                    .persist_with_event(
                        payment,
                        AuditSubtype::PaymentRegistration,
                        &format!("Registration failed: {reason}"),
                        &[],
                    )
                    .await?;
                Ok(false)
            }
        }
    }

    fn balance_changed(&self, paid: i64, payable: i64) -> bool {
        let exact = self.config.exact_balance_required;
        let no_credit = exact || self.config.credit_unsupported;
        (exact && paid != payable) || (no_credit && paid > payable)
    }
}
