use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Create,
    Fee,
    Paid,
    Canceled,
    PaymentFailed,
    RegistrationStarted,
    Registered,
    RegistrationFailed,
    RegistrationExpired,
    Reported,
    FinesUpdated,
    RegistrationResolved,
}

/// A recorded step in the life of a payment, addressed by local identifier.
///
/// Only the columns relevant to the event type are read; `at` defaults to the
/// time the event is processed.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentEvent {
    pub event: EventType,
    pub local_id: String,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<u64>,
    #[serde(default)]
    pub cat_username: Option<String>,
    #[serde(default)]
    pub source_ils: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub tax_percent: Option<i32>,
    #[serde(default)]
    pub fine_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PaymentEvent {
    pub fn new(event: EventType, local_id: impl Into<String>) -> Self {
        Self {
            event,
            local_id: local_id.into(),
            at: None,
            user: None,
            cat_username: None,
            source_ils: None,
            amount: None,
            currency: None,
            tax_percent: None,
            fine_id: None,
            title: None,
            message: None,
        }
    }
}
