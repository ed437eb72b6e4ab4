#![allow(dead_code)]

use chrono::{DateTime, Utc};
use fine_payments::application::service::PaymentService;
use fine_payments::domain::clock::ManualClock;
use fine_payments::infrastructure::in_memory::{
    InMemoryAuditEventStore, InMemoryPaymentFeeStore, InMemoryPaymentStore,
};
use std::io::{Error, Write};
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const EVENTS_HEADER: &str =
    "event,local_id,at,user,cat_username,source_ils,amount,currency,tax_percent,fine_id,title,message";

/// 2023-11-14T22:13:20Z
pub const START: i64 = 1_700_000_000;

pub fn at(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(START + offset_secs, 0).unwrap()
}

/// An in-memory payment service driven by a manual clock.
pub fn service() -> (Arc<PaymentService>, ManualClock) {
    let clock = ManualClock::new(at(0));
    let service = Arc::new(PaymentService::new(
        Box::new(InMemoryPaymentStore::new()),
        Box::new(InMemoryPaymentFeeStore::new()),
        Box::new(InMemoryAuditEventStore::new()),
        Arc::new(clock.clone()),
    ));
    (service, clock)
}

/// Writes an events CSV file with the standard header followed by `rows`.
pub fn events_file(rows: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{EVENTS_HEADER}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    file.flush()?;
    Ok(file)
}
