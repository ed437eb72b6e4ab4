use super::row::{PaymentFeeRow, PaymentRow};
use crate::domain::audit::AuditEvent;
use crate::domain::fee::{FeeId, PaymentFee};
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{AuditEventStore, PaymentFeeStore, PaymentStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct PaymentTable {
    rows: BTreeMap<PaymentId, PaymentRow>,
    last_id: PaymentId,
}

/// A thread-safe in-memory store for payments.
///
/// Rows go through the same storage adapter as the persistent backend, so column
/// limits and the sentinel timestamps behave identically.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    table: Arc<RwLock<PaymentTable>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn save(&self, payment: &mut Payment) -> Result<PaymentId> {
        let mut table = self.table.write().await;
        let id = payment.id.unwrap_or(table.last_id + 1);
        let row = PaymentRow::from_payment(id, payment)?;

        if table
            .rows
            .values()
            .any(|other| other.id != id && other.local_identifier == row.local_identifier)
        {
            return Err(PaymentError::StorageConstraint(format!(
                "duplicate local identifier '{}'",
                row.local_identifier
            )));
        }

        table.last_id = table.last_id.max(id);
        table.rows.insert(id, row);
        payment.id = Some(id);
        Ok(id)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let table = self.table.read().await;
        table
            .rows
            .get(&id)
            .cloned()
            .map(PaymentRow::into_payment)
            .transpose()
    }

    async fn get_by_local_identifier(&self, local_identifier: &str) -> Result<Option<Payment>> {
        let table = self.table.read().await;
        table
            .rows
            .values()
            .find(|row| row.local_identifier == local_identifier)
            .cloned()
            .map(PaymentRow::into_payment)
            .transpose()
    }

    async fn all_payments(&self) -> Result<Vec<Payment>> {
        let table = self.table.read().await;
        table
            .rows
            .values()
            .cloned()
            .map(PaymentRow::into_payment)
            .collect()
    }
}

#[derive(Default)]
struct FeeTable {
    rows: BTreeMap<FeeId, PaymentFeeRow>,
    last_id: FeeId,
}

/// A thread-safe in-memory store for payment fees.
#[derive(Default, Clone)]
pub struct InMemoryPaymentFeeStore {
    table: Arc<RwLock<FeeTable>>,
}

impl InMemoryPaymentFeeStore {
    /// Creates a new, empty in-memory fee store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentFeeStore for InMemoryPaymentFeeStore {
    async fn save(&self, fee: &mut PaymentFee) -> Result<FeeId> {
        let mut table = self.table.write().await;
        let id = fee.id.unwrap_or(table.last_id + 1);
        let row = PaymentFeeRow::from_fee(id, fee)?;
        table.last_id = table.last_id.max(id);
        table.rows.insert(id, row);
        fee.id = Some(id);
        Ok(id)
    }

    async fn fees_for_payment(&self, payment_id: PaymentId) -> Result<Vec<PaymentFee>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|row| row.payment_id == payment_id)
            .cloned()
            .map(PaymentFeeRow::into_fee)
            .collect())
    }
}

/// A thread-safe in-memory audit trail.
#[derive(Default, Clone)]
pub struct InMemoryAuditEventStore {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl InMemoryAuditEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditEventStore for InMemoryAuditEventStore {
    async fn add_payment_event(&self, event: AuditEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn events_for_payment(&self, payment_id: PaymentId) -> Result<Vec<AuditEvent>> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|event| event.payment_id == payment_id)
            .cloned()
            .collect())
    }
}
