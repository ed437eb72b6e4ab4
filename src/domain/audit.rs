use super::payment::{PaymentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which part of the payment workflow an audit event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSubtype {
    /// Payment creation and the payment provider's responses.
    Payment,
    /// Marking the payment as paid in the ILS.
    PaymentRegistration,
}

impl AuditSubtype {
    pub fn label(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::PaymentRegistration => "payment_registration",
        }
    }
}

impl fmt::Display for AuditSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in a payment's audit trail.
///
/// Events are append-only. `data` carries free-form details such as the error
/// text of a failed registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub payment_id: PaymentId,
    pub user: UserId,
    pub subtype: AuditSubtype,
    pub message: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    pub created: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        payment_id: PaymentId,
        user: UserId,
        subtype: AuditSubtype,
        message: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            payment_id,
            user,
            subtype,
            message: message.into(),
            data: BTreeMap::new(),
            created,
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_subtype_label() {
        let created = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let event = AuditEvent::new(7, UserId(3), AuditSubtype::PaymentRegistration, "Registration failed", created)
            .with_data("error", "connection reset");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["subtype"], "payment_registration");
        assert_eq!(json["data"]["error"], "connection reset");
        assert_eq!(AuditSubtype::Payment.to_string(), "payment");

        let back: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
