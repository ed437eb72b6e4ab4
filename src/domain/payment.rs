use super::status::PaymentStatus;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds after which a started ILS registration is considered abandoned.
pub const ILS_REGISTRATION_TIMEOUT_SECS: i64 = 120;

pub type PaymentId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One online payment of library fines.
///
/// Amounts are in minor currency units and include tax. The status only changes
/// through the `apply_*` transitions.
/// Transitions never fail and may be re-applied, in which case any timestamp they
/// stamp is overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub(crate) id: Option<PaymentId>,
    pub(crate) local_identifier: String,
    pub(crate) remote_identifier: Option<String>,
    pub(crate) user: UserId,
    pub(crate) source_ils: String,
    pub(crate) cat_username: String,
    pub(crate) amount: i64,
    pub(crate) currency: String,
    pub(crate) service_fee: i64,
    pub(crate) created: Option<DateTime<Utc>>,
    pub(crate) paid: Option<DateTime<Utc>>,
    pub(crate) registration_started: Option<DateTime<Utc>>,
    pub(crate) registered: Option<DateTime<Utc>>,
    pub(crate) reported: Option<DateTime<Utc>>,
    pub(crate) status: PaymentStatus,
    pub(crate) status_message: String,
}

impl Payment {
    pub fn new(user: UserId, local_identifier: impl Into<String>) -> Self {
        Self {
            id: None,
            local_identifier: local_identifier.into(),
            remote_identifier: None,
            user,
            source_ils: String::new(),
            cat_username: String::new(),
            amount: 0,
            currency: String::new(),
            service_fee: 0,
            created: None,
            paid: None,
            registration_started: None,
            registered: None,
            reported: None,
            status: PaymentStatus::InProgress,
            status_message: String::new(),
        }
    }

    /// Identifier assigned by the store on first save.
    pub fn id(&self) -> Option<PaymentId> {
        self.id
    }

    pub fn local_identifier(&self) -> &str {
        &self.local_identifier
    }

    pub fn set_local_identifier(&mut self, local_identifier: impl Into<String>) -> &mut Self {
        self.local_identifier = local_identifier.into();
        self
    }

    pub fn remote_identifier(&self) -> Option<&str> {
        self.remote_identifier.as_deref()
    }

    pub fn set_remote_identifier(&mut self, remote_identifier: Option<String>) -> &mut Self {
        self.remote_identifier = remote_identifier;
        self
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn set_user(&mut self, user: UserId) -> &mut Self {
        self.user = user;
        self
    }

    pub fn source_ils(&self) -> &str {
        &self.source_ils
    }

    pub fn set_source_ils(&mut self, source_ils: impl Into<String>) -> &mut Self {
        self.source_ils = source_ils.into();
        self
    }

    pub fn cat_username(&self) -> &str {
        &self.cat_username
    }

    /// Stored in a 50 character column; longer values are rejected on save.
    pub fn set_cat_username(&mut self, cat_username: impl Into<String>) -> &mut Self {
        self.cat_username = cat_username.into();
        self
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn set_amount(&mut self, amount: i64) -> &mut Self {
        self.amount = amount;
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn set_currency(&mut self, currency: impl Into<String>) -> &mut Self {
        self.currency = currency.into();
        self
    }

    pub fn service_fee(&self) -> i64 {
        self.service_fee
    }

    pub fn set_service_fee(&mut self, service_fee: i64) -> &mut Self {
        self.service_fee = service_fee;
        self
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn set_created(&mut self, created: Option<DateTime<Utc>>) -> &mut Self {
        self.created = created;
        self
    }

    pub fn paid(&self) -> Option<DateTime<Utc>> {
        self.paid
    }

    pub fn registration_started(&self) -> Option<DateTime<Utc>> {
        self.registration_started
    }

    pub fn registered(&self) -> Option<DateTime<Utc>> {
        self.registered
    }

    pub fn reported(&self) -> Option<DateTime<Utc>> {
        self.reported
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == PaymentStatus::InProgress
    }

    pub fn is_registered(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// True when money has been collected but the ILS has not accepted it yet.
    pub fn is_registration_needed(&self) -> bool {
        matches!(
            self.status,
            PaymentStatus::Paid | PaymentStatus::RegistrationFailed
        )
    }

    pub fn is_registration_in_progress(&self) -> bool {
        self.is_registration_in_progress_at(Utc::now())
    }

    /// True when a registration was started less than
    /// [`ILS_REGISTRATION_TIMEOUT_SECS`] before `now`.
    pub fn is_registration_in_progress_at(&self, now: DateTime<Utc>) -> bool {
        self.registration_started
            .is_some_and(|started| now - started < TimeDelta::seconds(ILS_REGISTRATION_TIMEOUT_SECS))
    }

    pub fn apply_canceled_status(&mut self) -> &mut Self {
        self.set_status(PaymentStatus::Canceled, String::new())
    }

    pub fn apply_payment_failed_status(&mut self) -> &mut Self {
        self.set_status(PaymentStatus::PaymentFailed, String::new())
    }

    pub fn apply_payment_paid_status(&mut self) -> &mut Self {
        self.apply_payment_paid_status_at(Utc::now())
    }

    pub fn apply_payment_paid_status_at(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.paid = Some(now);
        self.set_status(PaymentStatus::Paid, String::new())
    }

    pub fn apply_registered_status(&mut self) -> &mut Self {
        self.apply_registered_status_at(Utc::now())
    }

    pub fn apply_registered_status_at(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.registered = Some(now);
        self.set_status(PaymentStatus::Completed, String::new())
    }

    /// Keeps `message` as the status message and forgets the registration start so
    /// a retry is not blocked by the in-progress window.
    pub fn apply_registration_failed_status(&mut self, message: impl Into<String>) -> &mut Self {
        self.registration_started = None;
        self.set_status(PaymentStatus::RegistrationFailed, message.into())
    }

    pub fn apply_registration_started_status(&mut self) -> &mut Self {
        self.apply_registration_started_status_at(Utc::now())
    }

    /// Stamps the registration start; the status is left as is.
    pub fn apply_registration_started_status_at(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.registration_started = Some(now);
        self
    }

    pub fn apply_registration_expired_status(&mut self) -> &mut Self {
        self.set_status(PaymentStatus::RegistrationExpired, String::new())
    }

    pub fn apply_reported_status(&mut self) -> &mut Self {
        self.apply_reported_status_at(Utc::now())
    }

    /// Stamps the report time; the status is left as is.
    pub fn apply_reported_status_at(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.reported = Some(now);
        self
    }

    pub fn apply_fines_updated_status(&mut self) -> &mut Self {
        self.set_status(PaymentStatus::FinesUpdated, String::new())
    }

    pub fn apply_registration_resolved_status(&mut self) -> &mut Self {
        self.apply_registration_resolved_status_at(Utc::now())
    }

    pub fn apply_registration_resolved_status_at(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.registered = Some(now);
        self.set_status(PaymentStatus::RegistrationResolved, String::new())
    }

    fn set_status(&mut self, status: PaymentStatus, message: String) -> &mut Self {
        self.status = status;
        self.status_message = message;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn payment() -> Payment {
        let mut payment = Payment::new(UserId(1), "local-1");
        payment
            .set_cat_username("patron")
            .set_source_ils("Demo")
            .set_amount(1100)
            .set_currency("EUR");
        payment
    }

    #[test]
    fn test_new_payment_is_in_progress() {
        let payment = payment();
        assert!(payment.is_in_progress());
        assert!(!payment.is_registered());
        assert!(!payment.is_registration_needed());
        assert!(!payment.is_registration_in_progress());
        assert_eq!(payment.id(), None);
        assert_eq!(payment.paid(), None);
        assert_eq!(payment.status_message(), "");
    }

    #[test]
    fn test_paid_twice_restamps() {
        let mut payment = payment();
        payment.apply_payment_paid_status_at(at(0));
        assert_eq!(payment.status(), PaymentStatus::Paid);
        assert_eq!(payment.paid(), Some(at(0)));

        payment.apply_payment_paid_status_at(at(30));
        assert_eq!(payment.status(), PaymentStatus::Paid);
        assert_eq!(payment.paid(), Some(at(30)));
    }

    #[test]
    fn test_registration_needed_only_for_paid_and_failed() {
        for status in PaymentStatus::ALL {
            let mut payment = payment();
            payment.status = status;
            let expected = matches!(
                status,
                PaymentStatus::Paid | PaymentStatus::RegistrationFailed
            );
            assert_eq!(payment.is_registration_needed(), expected, "{status}");
        }
    }

    #[test]
    fn test_registration_in_progress_window() {
        let mut payment = payment();
        payment.apply_registration_started_status_at(at(0));
        assert!(payment.is_registration_in_progress_at(at(0)));
        assert!(payment.is_registration_in_progress_at(at(119)));
        assert!(!payment.is_registration_in_progress_at(at(120)));
        assert!(!payment.is_registration_in_progress_at(at(121)));
    }

    #[test]
    fn test_registration_started_keeps_status() {
        let mut payment = payment();
        payment.apply_payment_paid_status_at(at(0));
        payment.apply_registration_started_status_at(at(5));
        assert_eq!(payment.status(), PaymentStatus::Paid);
        assert_eq!(payment.registration_started(), Some(at(5)));
    }

    #[test]
    fn test_registration_failed_keeps_message_and_clears_start() {
        let mut payment = payment();
        payment.apply_payment_paid_status_at(at(0));
        payment.apply_registration_started_status_at(at(1));
        payment.apply_registration_failed_status("timeout");

        assert_eq!(payment.status(), PaymentStatus::RegistrationFailed);
        assert_eq!(payment.status_message(), "timeout");
        assert_eq!(payment.registration_started(), None);
        assert!(!payment.is_registration_in_progress_at(at(2)));
        assert!(payment.is_registration_needed());
    }

    #[test]
    fn test_transitions_clear_message() {
        let transitions: [fn(&mut Payment); 7] = [
            |p| {
                p.apply_canceled_status();
            },
            |p| {
                p.apply_payment_failed_status();
            },
            |p| {
                p.apply_payment_paid_status();
            },
            |p| {
                p.apply_registered_status();
            },
            |p| {
                p.apply_registration_expired_status();
            },
            |p| {
                p.apply_fines_updated_status();
            },
            |p| {
                p.apply_registration_resolved_status();
            },
        ];
        for transition in transitions {
            let mut payment = payment();
            payment.apply_registration_failed_status("boom");
            transition(&mut payment);
            assert_eq!(payment.status_message(), "");
        }
    }

    #[test]
    fn test_registered_and_resolved_stamp_registered() {
        let mut payment = payment();
        payment.apply_registered_status_at(at(10));
        assert!(payment.is_registered());
        assert_eq!(payment.registered(), Some(at(10)));

        let mut payment = self::payment();
        payment.apply_registration_expired_status();
        payment.apply_registration_resolved_status_at(at(20));
        assert_eq!(payment.status(), PaymentStatus::RegistrationResolved);
        assert_eq!(payment.registered(), Some(at(20)));
        assert!(!payment.is_registered());
    }

    #[test]
    fn test_reported_keeps_status_and_message() {
        let mut payment = payment();
        payment.apply_registration_failed_status("ils down");
        payment.apply_reported_status_at(at(50));
        assert_eq!(payment.reported(), Some(at(50)));
        assert_eq!(payment.status(), PaymentStatus::RegistrationFailed);
        assert_eq!(payment.status_message(), "ils down");
    }
}
