use crate::domain::payment::Payment;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// Flat CSV view of a payment. Unassigned timestamps are written as empty fields.
#[derive(Debug, Serialize)]
pub struct PaymentRecord<'a> {
    pub id: Option<u64>,
    pub local_identifier: &'a str,
    pub remote_identifier: Option<&'a str>,
    pub source_ils: &'a str,
    pub cat_username: &'a str,
    pub status: &'static str,
    pub amount: i64,
    pub service_fee: i64,
    pub currency: &'a str,
    pub created: Option<DateTime<Utc>>,
    pub paid: Option<DateTime<Utc>>,
    pub registered: Option<DateTime<Utc>>,
    pub reported: Option<DateTime<Utc>>,
    pub status_message: &'a str,
}

impl<'a> From<&'a Payment> for PaymentRecord<'a> {
    fn from(payment: &'a Payment) -> Self {
        Self {
            id: payment.id(),
            local_identifier: payment.local_identifier(),
            remote_identifier: payment.remote_identifier(),
            source_ils: payment.source_ils(),
            cat_username: payment.cat_username(),
            status: payment.status().label(),
            amount: payment.amount(),
            service_fee: payment.service_fee(),
            currency: payment.currency(),
            created: payment.created(),
            paid: payment.paid(),
            registered: payment.registered(),
            reported: payment.reported(),
            status_message: payment.status_message(),
        }
    }
}

/// Writes payments as CSV with a header row.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_payments<'a, I>(&mut self, payments: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Payment>,
    {
        for payment in payments {
            self.writer.serialize(PaymentRecord::from(payment))?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::PaymentError::IoError(e.into_error()))
    }
}
