use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a payment.
///
/// The integer codes are the stored representation and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum PaymentStatus {
    /// Created, waiting for the payment provider.
    #[default]
    InProgress,
    /// Paid and registered with the ILS.
    Completed,
    Canceled,
    /// Paid at the provider, not yet registered with the ILS.
    Paid,
    PaymentFailed,
    RegistrationFailed,
    RegistrationExpired,
    /// A failed or expired registration was resolved manually.
    RegistrationResolved,
    /// The ILS fines changed after payment so registration was not attempted.
    FinesUpdated,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 9] = [
        PaymentStatus::InProgress,
        PaymentStatus::Completed,
        PaymentStatus::Canceled,
        PaymentStatus::Paid,
        PaymentStatus::PaymentFailed,
        PaymentStatus::RegistrationFailed,
        PaymentStatus::RegistrationExpired,
        PaymentStatus::RegistrationResolved,
        PaymentStatus::FinesUpdated,
    ];

    pub fn code(self) -> i32 {
        match self {
            PaymentStatus::InProgress => 0,
            PaymentStatus::Completed => 1,
            PaymentStatus::Canceled => 2,
            PaymentStatus::Paid => 3,
            PaymentStatus::PaymentFailed => 4,
            PaymentStatus::RegistrationFailed => 5,
            PaymentStatus::RegistrationExpired => 6,
            PaymentStatus::RegistrationResolved => 7,
            PaymentStatus::FinesUpdated => 8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::InProgress => "in_progress",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Paid => "paid",
            PaymentStatus::PaymentFailed => "payment_failed",
            PaymentStatus::RegistrationFailed => "registration_failed",
            PaymentStatus::RegistrationExpired => "registration_expired",
            PaymentStatus::RegistrationResolved => "registration_resolved",
            PaymentStatus::FinesUpdated => "fines_updated",
        }
    }
}

impl TryFrom<i32> for PaymentStatus {
    type Error = PaymentError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or(PaymentError::UnknownStatus(code))
    }
}

impl From<PaymentStatus> for i32 {
    fn from(status: PaymentStatus) -> Self {
        status.code()
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == s)
            .ok_or_else(|| PaymentError::ValidationError(format!("Unknown payment status: {s}")))
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
