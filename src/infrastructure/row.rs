//! Stored representation of payments and fees.
//!
//! Timestamp columns are non-nullable, so an unassigned timestamp is written as
//! [`unassigned_datetime`] and read back as `None`. Statuses are stored as their
//! integer code. Column lengths and non-negative amounts are enforced here:
//! values that do not fit are rejected, never cut.

use crate::domain::fee::{FeeId, PaymentFee};
use crate::domain::payment::{Payment, PaymentId, UserId};
use crate::domain::status::PaymentStatus;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const IDENTIFIER_MAX_CHARS: usize = 255;
pub const CAT_USERNAME_MAX_CHARS: usize = 50;
pub const CURRENCY_MAX_CHARS: usize = 3;
pub const STATUS_MESSAGE_MAX_CHARS: usize = 255;
pub const FINE_ID_MAX_CHARS: usize = 1024;

/// `2000-01-01T00:00:00`, the stored stand-in for "no timestamp".
pub fn unassigned_datetime() -> NaiveDateTime {
    DateTime::<Utc>::from_timestamp(946_684_800, 0)
        .unwrap_or_default()
        .naive_utc()
}

pub fn to_column(value: Option<DateTime<Utc>>) -> NaiveDateTime {
    value.map_or_else(unassigned_datetime, |value| value.naive_utc())
}

pub fn from_column(value: NaiveDateTime) -> Option<DateTime<Utc>> {
    (value != unassigned_datetime()).then(|| value.and_utc())
}

fn check_length(column: &str, value: &str, max_chars: usize) -> Result<()> {
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(PaymentError::StorageConstraint(format!(
            "value for column '{column}' is {chars} characters long, limit is {max_chars}"
        )));
    }
    Ok(())
}

fn check_non_negative(column: &str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(PaymentError::StorageConstraint(format!(
            "value for column '{column}' is {value}, amounts cannot be negative"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id: PaymentId,
    pub local_identifier: String,
    pub remote_identifier: Option<String>,
    pub user_id: u64,
    pub source_ils: String,
    pub cat_username: String,
    pub amount: i64,
    pub currency: String,
    pub service_fee: i64,
    pub created: NaiveDateTime,
    pub paid: NaiveDateTime,
    pub registration_started: NaiveDateTime,
    pub registered: NaiveDateTime,
    pub status: i32,
    pub status_message: String,
    pub reported: NaiveDateTime,
}

impl PaymentRow {
    /// Builds the row for `payment` stored under `id`.
    pub fn from_payment(id: PaymentId, payment: &Payment) -> Result<Self> {
        check_length("local_identifier", &payment.local_identifier, IDENTIFIER_MAX_CHARS)?;
        if let Some(remote) = &payment.remote_identifier {
            check_length("remote_identifier", remote, IDENTIFIER_MAX_CHARS)?;
        }
        check_length("source_ils", &payment.source_ils, IDENTIFIER_MAX_CHARS)?;
        check_length("cat_username", &payment.cat_username, CAT_USERNAME_MAX_CHARS)?;
        check_length("currency", &payment.currency, CURRENCY_MAX_CHARS)?;
        check_length("status_message", &payment.status_message, STATUS_MESSAGE_MAX_CHARS)?;
        check_non_negative("amount", payment.amount)?;
        check_non_negative("service_fee", payment.service_fee)?;

        Ok(Self {
            id,
            local_identifier: payment.local_identifier.clone(),
            remote_identifier: payment.remote_identifier.clone(),
            user_id: payment.user.0,
            source_ils: payment.source_ils.clone(),
            cat_username: payment.cat_username.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            service_fee: payment.service_fee,
            created: to_column(payment.created),
            paid: to_column(payment.paid),
            registration_started: to_column(payment.registration_started),
            registered: to_column(payment.registered),
            status: payment.status.code(),
            status_message: payment.status_message.clone(),
            reported: to_column(payment.reported),
        })
    }

    pub fn into_payment(self) -> Result<Payment> {
        Ok(Payment {
            id: Some(self.id),
            local_identifier: self.local_identifier,
            remote_identifier: self.remote_identifier,
            user: UserId(self.user_id),
            source_ils: self.source_ils,
            cat_username: self.cat_username,
            amount: self.amount,
            currency: self.currency,
            service_fee: self.service_fee,
            created: from_column(self.created),
            paid: from_column(self.paid),
            registration_started: from_column(self.registration_started),
            registered: from_column(self.registered),
            reported: from_column(self.reported),
            status: PaymentStatus::try_from(self.status)?,
            status_message: self.status_message,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFeeRow {
    pub id: FeeId,
    pub payment_id: PaymentId,
    pub title: String,
    #[serde(rename = "type")]
    pub fee_type: String,
    pub description: String,
    pub amount: i64,
    pub tax_percent: i32,
    pub currency: String,
    pub fine_id: String,
    pub organization: String,
}

impl PaymentFeeRow {
    pub fn from_fee(id: FeeId, fee: &PaymentFee) -> Result<Self> {
        check_length("fine_id", &fee.fine_id, FINE_ID_MAX_CHARS)?;
        check_length("currency", &fee.currency, CURRENCY_MAX_CHARS)?;

        Ok(Self {
            id,
            payment_id: fee.payment_id,
            title: fee.title.clone(),
            fee_type: fee.fee_type.clone(),
            description: fee.description.clone(),
            amount: fee.amount,
            tax_percent: fee.tax_percent,
            currency: fee.currency.clone(),
            fine_id: fee.fine_id.clone(),
            organization: fee.organization.clone(),
        })
    }

    pub fn into_fee(self) -> PaymentFee {
        PaymentFee {
            id: Some(self.id),
            payment_id: self.payment_id,
            title: self.title,
            fee_type: self.fee_type,
            description: self.description,
            amount: self.amount,
            tax_percent: self.tax_percent,
            currency: self.currency,
            fine_id: self.fine_id,
            organization: self.organization,
        }
    }
}
