use super::audit::AuditEvent;
use super::fee::{FeeId, PaymentFee};
use super::payment::{Payment, PaymentId};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts or updates the payment. The identifier is assigned on first save.
    async fn save(&self, payment: &mut Payment) -> Result<PaymentId>;
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn get_by_local_identifier(&self, local_identifier: &str) -> Result<Option<Payment>>;
    async fn all_payments(&self) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait PaymentFeeStore: Send + Sync {
    /// Inserts or updates the fee. The identifier is assigned on first save.
    async fn save(&self, fee: &mut PaymentFee) -> Result<FeeId>;
    async fn fees_for_payment(&self, payment_id: PaymentId) -> Result<Vec<PaymentFee>>;
}

/// Append-only audit trail of the payment workflow.
#[async_trait]
pub trait AuditEventStore: Send + Sync {
    async fn add_payment_event(&self, event: AuditEvent) -> Result<()>;
    /// Events recorded for the payment, oldest first.
    async fn events_for_payment(&self, payment_id: PaymentId) -> Result<Vec<AuditEvent>>;
}

/// What the ILS is asked to mark as paid.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    pub payment_id: Option<PaymentId>,
    pub source_ils: String,
    pub cat_username: String,
    pub amount: i64,
    pub local_identifier: String,
    pub remote_identifier: Option<String>,
    /// Only set when the ILS supports paying selected fines.
    pub fine_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    /// The patron's fines no longer match what was paid.
    FinesChanged,
    Failed(String),
}

/// Connection to the integrated library system holding the patron's fines.
#[async_trait]
pub trait IlsGateway: Send + Sync {
    /// Current payable amount for the patron, restricted to `fine_ids` when given.
    /// `None` when the ILS reports nothing payable.
    async fn payable_amount(
        &self,
        source_ils: &str,
        cat_username: &str,
        fine_ids: &[String],
    ) -> Result<Option<i64>>;

    async fn register_payment(&self, request: RegistrationRequest) -> Result<RegistrationOutcome>;
}

/// Delivers reports of payments that need manual attention.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_unresolved(&self, source_ils: &str, payments: &[Payment]) -> Result<()>;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type PaymentFeeStoreBox = Box<dyn PaymentFeeStore>;
pub type AuditEventStoreBox = Box<dyn AuditEventStore>;
pub type IlsGatewayBox = Box<dyn IlsGateway>;
pub type NotifierBox = Box<dyn Notifier>;
