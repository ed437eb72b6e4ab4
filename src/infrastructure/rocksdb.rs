use super::row::{PaymentFeeRow, PaymentRow};
use crate::domain::audit::AuditEvent;
use crate::domain::fee::{FeeId, PaymentFee};
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{AuditEventStore, PaymentFeeStore, PaymentStore};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for payment rows.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for fee rows.
pub const CF_PAYMENT_FEES: &str = "payment_fees";
/// Column Family for the append-only payment audit trail.
pub const CF_PAYMENT_EVENTS: &str = "payment_events";
/// Column Family for identifier sequences.
pub const CF_SEQUENCES: &str = "sequences";

const PAYMENT_SEQUENCE: &[u8] = b"payment";
const FEE_SEQUENCE: &[u8] = b"payment_fee";
const EVENT_SEQUENCE: &[u8] = b"payment_event";

/// A persistent store implementation using RocksDB.
///
/// Payments, fees and audit events live in separate Column Families keyed by their big-endian
/// identifier; rows are JSON encoded. `Clone` shares the underlying `Arc<DB>`,
/// and writes are serialized through one lock so identifier assignment and the
/// local identifier uniqueness check cannot interleave.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_PAYMENTS, CF_PAYMENT_FEES, CF_PAYMENT_EVENTS, CF_SEQUENCES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn last_id(&self, sequence: &[u8]) -> Result<u64> {
        let cf = self.cf(CF_SEQUENCES)?;
        match self.db.get_pinned_cf(cf, sequence)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    PaymentError::InternalError(Box::new(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "corrupt identifier sequence",
                    )))
                })?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    fn bump_sequence(&self, sequence: &[u8], id: u64) -> Result<()> {
        if id > self.last_id(sequence)? {
            let cf = self.cf(CF_SEQUENCES)?;
            self.db.put_cf(cf, sequence, id.to_be_bytes())?;
        }
        Ok(())
    }

    fn payment_rows(&self) -> Result<Vec<PaymentRow>> {
        let cf = self.cf(CF_PAYMENTS)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| -> Result<PaymentRow> {
                let (_key, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn save(&self, payment: &mut Payment) -> Result<PaymentId> {
        let _guard = self.write_lock.lock().await;

        let id = match payment.id {
            Some(id) => id,
            None => self.last_id(PAYMENT_SEQUENCE)? + 1,
        };
        let row = PaymentRow::from_payment(id, payment)?;

        if self
            .payment_rows()?
            .iter()
            .any(|other| other.id != id && other.local_identifier == row.local_identifier)
        {
            return Err(PaymentError::StorageConstraint(format!(
                "duplicate local identifier '{}'",
                row.local_identifier
            )));
        }

        let cf = self.cf(CF_PAYMENTS)?;
        self.db.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(&row)?)?;
        self.bump_sequence(PAYMENT_SEQUENCE, id)?;

        payment.id = Some(id);
        Ok(id)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let cf = self.cf(CF_PAYMENTS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => {
                let row: PaymentRow = serde_json::from_slice(&bytes)?;
                Ok(Some(row.into_payment()?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_local_identifier(&self, local_identifier: &str) -> Result<Option<Payment>> {
        self.payment_rows()?
            .into_iter()
            .find(|row| row.local_identifier == local_identifier)
            .map(PaymentRow::into_payment)
            .transpose()
    }

    async fn all_payments(&self) -> Result<Vec<Payment>> {
        self.payment_rows()?
            .into_iter()
            .map(PaymentRow::into_payment)
            .collect()
    }
}

#[async_trait]
impl PaymentFeeStore for RocksDBStore {
    async fn save(&self, fee: &mut PaymentFee) -> Result<FeeId> {
        let _guard = self.write_lock.lock().await;

        let id = match fee.id {
            Some(id) => id,
            None => self.last_id(FEE_SEQUENCE)? + 1,
        };
        let row = PaymentFeeRow::from_fee(id, fee)?;

        let cf = self.cf(CF_PAYMENT_FEES)?;
        self.db.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(&row)?)?;
        self.bump_sequence(FEE_SEQUENCE, id)?;

        fee.id = Some(id);
        Ok(id)
    }

    async fn fees_for_payment(&self, payment_id: PaymentId) -> Result<Vec<PaymentFee>> {
        let cf = self.cf(CF_PAYMENT_FEES)?;
        let mut fees = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let row: PaymentFeeRow = serde_json::from_slice(&value)?;
            if row.payment_id == payment_id {
                fees.push(row.into_fee());
            }
        }
        Ok(fees)
    }
}

#[async_trait]
impl AuditEventStore for RocksDBStore {
    async fn add_payment_event(&self, event: AuditEvent) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let id = self.last_id(EVENT_SEQUENCE)? + 1;
        let cf = self.cf(CF_PAYMENT_EVENTS)?;
        self.db.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(&event)?)?;
        self.bump_sequence(EVENT_SEQUENCE, id)
    }

    async fn events_for_payment(&self, payment_id: PaymentId) -> Result<Vec<AuditEvent>> {
        let cf = self.cf(CF_PAYMENT_EVENTS)?;
        let mut events = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            let event: AuditEvent = serde_json::from_slice(&value)?;
            if event.payment_id == payment_id {
                events.push(event);
            }
        }
        Ok(events)
    }
}
