use super::registration::RegistrationService;
use super::service::PaymentService;
use crate::domain::audit::AuditSubtype;
use crate::domain::payment::Payment;
use crate::domain::ports::NotifierBox;
use crate::error::{PaymentError, Result};
use chrono::TimeDelta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Lowest accepted `minimum_paid_age_secs`.
pub const MIN_PAID_AGE_FLOOR_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Seconds a payment may stay paid but unregistered before it is retried.
    pub minimum_paid_age_secs: i64,
    /// Minutes between repeated reports of the same unresolved payment.
    pub report_interval_minutes: i64,
    /// Minutes after payment during which registration is retried.
    pub retry_minutes: i64,
    /// Whether unresolved payments are reported at all.
    pub notify: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            minimum_paid_age_secs: 120,
            report_interval_minutes: 120,
            retry_minutes: 120,
            notify: true,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.minimum_paid_age_secs < MIN_PAID_AGE_FLOOR_SECS {
            return Err(PaymentError::ValidationError(format!(
                "Minimum paid age must be at least {MIN_PAID_AGE_FLOOR_SECS} seconds"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub registered: usize,
    pub failed: usize,
    pub expired: usize,
    pub reported: usize,
}

/// Reconciliation job for paid payments that did not reach the ILS.
///
/// Retries failed registrations, expires payments whose retry window has passed
/// and reports payments that need staff attention, grouped by source ILS.
pub struct PaymentMonitor {
    service: Arc<PaymentService>,
    registration: RegistrationService,
    notifier: NotifierBox,
    config: MonitorConfig,
}

impl PaymentMonitor {
    /// Creates a monitor.
    ///
    /// # Arguments
    ///
    /// * `service` - Payment storage, shared with `registration`.
    /// * `registration` - Performs the actual registration attempts.
    /// * `notifier` - Receives reports of payments that need manual attention.
    /// * `config` - Age, retry and reporting limits.
    pub fn new(
        service: Arc<PaymentService>,
        registration: RegistrationService,
        notifier: NotifierBox,
        config: MonitorConfig,
    ) -> Self {
        Self {
            service,
            registration,
            notifier,
            config,
        }
    }

    /// Runs one reconciliation pass and returns what it did.
    ///
    /// Fails without touching any payment when the configuration is invalid.
    /// Failures of single payments are counted, not returned.
    pub async fn run(&self) -> Result<MonitorSummary> {
        self.config.validate()?;
        info!("Online payment monitor started");

        let mut summary = MonitorSummary::default();
        let failed = self
            .service
            .get_failed_payments(self.config.minimum_paid_age_secs)
            .await?;
        for mut payment in failed {
            self.process_payment(&mut payment, &mut summary).await?;
        }

        let unresolved = self
            .service
            .get_unresolved_payments_to_report(self.config.report_interval_minutes)
            .await?;

        if summary.registered > 0 {
            info!("Total registered: {}", summary.registered);
        }
        if summary.expired > 0 {
            info!("Total expired: {}", summary.expired);
        }
        if summary.failed > 0 {
            info!("Total failed: {}", summary.failed);
        }

        if self.config.notify && !unresolved.is_empty() {
            info!("Total to be reminded: {}", unresolved.len());
            summary.reported = self.send_reports(unresolved).await?;
        }

        info!("Online payment monitor completed");
        Ok(summary)
    }

    async fn process_payment(&self, payment: &mut Payment, summary: &mut MonitorSummary) -> Result<()> {
        info!(
            id = ?payment.id(),
            local_identifier = payment.local_identifier(),
            status = %payment.status(),
            status_message = payment.status_message(),
            paid = ?payment.paid(),
            "Registering payment"
        );

        let now = self.service.now();
        let retry_window = TimeDelta::minutes(self.config.retry_minutes);
        if payment.paid().is_some_and(|paid| now - paid > retry_window) {
            payment.apply_registration_expired_status();
            self.service
                .persist_with_event(payment, AuditSubtype::PaymentRegistration, "Marked as expired", &[])
                .await?;
            info!(local_identifier = payment.local_identifier(), "Payment marked as expired");
            summary.expired += 1;
            return Ok(());
        }

        match self.registration.register_payment(payment).await {
            Ok(true) => summary.registered += 1,
            Ok(false) => summary.failed += 1,
            Err(e) => {
                error!(
                    id = ?payment.id(),
                    user = %payment.user(),
                    cat_username = payment.cat_username(),
                    "Exception while processing payment: {e}"
                );
                if let Err(audit) = self
                    .service
                    .add_payment_event(
                        payment,
                        AuditSubtype::PaymentRegistration,
                        "Exception processing payment",
                        &[("error", e.to_string().as_str())],
                    )
                    .await
                {
                    warn!(id = ?payment.id(), "Failed to record audit event: {audit}");
                }
                summary.failed += 1;
            }
        }
        Ok(())
    }

    /// Returns the number of payments marked as reported.
    async fn send_reports(&self, payments: Vec<Payment>) -> Result<usize> {
        let mut by_source: BTreeMap<String, Vec<Payment>> = BTreeMap::new();
        for payment in payments {
            by_source
                .entry(payment.source_ils().to_string())
                .or_default()
                .push(payment);
        }

        let mut reported = 0;
        for (source, mut payments) in by_source {
            info!("Inform {} unresolved payments (source: {source})", payments.len());
            if let Err(e) = self.notifier.notify_unresolved(&source, &payments).await {
                warn!("Failed to send report of unresolved payments (source: {source}): {e}");
                continue;
            }
            let now = self.service.now();
            for payment in &mut payments {
                payment.apply_reported_status_at(now);
                self.service.persist(payment).await?;
                reported += 1;
            }
        }
        Ok(reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_paid_age_floor() {
        let config = MonitorConfig {
            minimum_paid_age_secs: 9,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(MonitorConfig::default().validate().is_ok());
    }
}
