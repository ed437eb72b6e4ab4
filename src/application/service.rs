use crate::domain::audit::{AuditEvent, AuditSubtype};
use crate::domain::clock::ClockBox;
use crate::domain::fee::{FeeId, PaymentFee};
use crate::domain::money::TaxBreakdown;
use crate::domain::payment::{Payment, PaymentId, UserId};
use crate::domain::ports::{AuditEventStoreBox, PaymentFeeStoreBox, PaymentStoreBox};
use crate::domain::query::{self, Page, PaymentFilter, PAID_IN_PROGRESS_STATUSES, PAID_STATUSES};
use crate::domain::status::PaymentStatus;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;

/// Result of [`PaymentService::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPage {
    pub items: Vec<Payment>,
    /// Number of matches across all pages.
    pub total: usize,
}

/// Creation, persistence and lookup of payments and their fees.
///
/// Every store is injected as a trait object so the same service runs against
/// the in-memory tables and the RocksDB backend. Time is read from the injected
/// clock only, which keeps the timeout and age queries deterministic in tests.
pub struct PaymentService {
    payments: PaymentStoreBox,
    fees: PaymentFeeStoreBox,
    events: AuditEventStoreBox,
    clock: ClockBox,
}

impl PaymentService {
    /// Creates a service over the given stores.
    ///
    /// # Arguments
    ///
    /// * `payments` - Storage for payment rows.
    /// * `fees` - Storage for the fee lines of each payment.
    /// * `events` - Append-only audit trail of the payment workflow.
    /// * `clock` - Source of the current time.
    pub fn new(
        payments: PaymentStoreBox,
        fees: PaymentFeeStoreBox,
        events: AuditEventStoreBox,
        clock: ClockBox,
    ) -> Self {
        Self {
            payments,
            fees,
            events,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns an unsaved payment stamped as created now.
    ///
    /// The caller fills in amounts and patron details and then calls
    /// [`persist`](Self::persist), which assigns the identifier.
    pub fn create_in_progress_payment(&self, user: UserId, local_identifier: &str) -> Payment {
        let mut payment = Payment::new(user, local_identifier);
        payment.set_created(Some(self.now()));
        payment
    }

    /// Inserts or updates `payment` and returns its identifier.
    ///
    /// Fails with `StorageConstraint` when a column does not fit, an amount is
    /// negative or the local identifier is already taken by another payment. A
    /// rejected payment keeps its previous identifier, or none.
    pub async fn persist(&self, payment: &mut Payment) -> Result<PaymentId> {
        self.payments.save(payment).await
    }

    /// Persists `payment` and appends an audit event describing the change.
    ///
    /// # Arguments
    ///
    /// * `payment` - The payment to save.
    /// * `subtype` - Workflow step the event belongs to.
    /// * `message` - Short human-readable description of what happened.
    /// * `data` - Extra key/value details, such as an error text.
    pub async fn persist_with_event(
        &self,
        payment: &mut Payment,
        subtype: AuditSubtype,
        message: &str,
        data: &[(&str, &str)],
    ) -> Result<PaymentId> {
        let id = self.persist(payment).await?;
        self.add_payment_event(payment, subtype, message, data).await?;
        Ok(id)
    }

    /// Appends an audit event for a stored payment without saving the payment.
    ///
    /// # Arguments
    ///
    /// * `payment` - The payment the event is about. It must have been persisted.
    /// * `subtype` - Workflow step the event belongs to.
    /// * `message` - Short human-readable description of what happened.
    /// * `data` - Extra key/value details, such as an error text.
    pub async fn add_payment_event(
        &self,
        payment: &Payment,
        subtype: AuditSubtype,
        message: &str,
        data: &[(&str, &str)],
    ) -> Result<()> {
        let Some(payment_id) = payment.id() else {
            return Err(PaymentError::NotFound(format!(
                "cannot record event for unsaved payment '{}'",
                payment.local_identifier()
            )));
        };
        let event = data.iter().fold(
            AuditEvent::new(payment_id, payment.user(), subtype, message, self.now()),
            |event, (key, value)| event.with_data(*key, *value),
        );
        self.events.add_payment_event(event).await
    }

    /// Audit trail of a payment, oldest first.
    pub async fn payment_events(&self, payment_id: PaymentId) -> Result<Vec<AuditEvent>> {
        self.events.events_for_payment(payment_id).await
    }

    /// Saves a fee. Its payment must already be stored.
    ///
    /// # Arguments
    ///
    /// * `fee` - The fee line. Its `payment_id` must refer to a stored payment,
    ///   otherwise `NotFound` is returned and nothing is written.
    pub async fn add_fee(&self, fee: &mut PaymentFee) -> Result<FeeId> {
        if self.payments.get(fee.payment_id()).await?.is_none() {
            return Err(PaymentError::NotFound(format!("id {}", fee.payment_id())));
        }
        self.fees.save(fee).await
    }

    pub async fn get_payment_by_id(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.payments.get(id).await
    }

    pub async fn get_payment_by_local_identifier(
        &self,
        local_identifier: &str,
    ) -> Result<Option<Payment>> {
        self.payments.get_by_local_identifier(local_identifier).await
    }

    /// Every stored payment in identifier order.
    pub async fn all_payments(&self) -> Result<Vec<Payment>> {
        self.payments.all_payments().await
    }

    /// Reloads `payment` from storage, discarding unsaved changes.
    ///
    /// An unsaved payment is left untouched. A saved payment that has since
    /// disappeared from storage yields `NotFound`.
    pub async fn refresh(&self, payment: &mut Payment) -> Result<()> {
        let Some(id) = payment.id() else {
            return Ok(());
        };
        *payment = self
            .payments
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("id {id}")))?;
        Ok(())
    }

    /// Most recently paid payment of the patron, in any paid status.
    pub async fn get_last_paid_payment_for_patron(&self, cat_username: &str) -> Result<Option<Payment>> {
        let payments = self.payments.all_payments().await?;
        Ok(payments
            .into_iter()
            .filter(|p| p.cat_username() == cat_username && PAID_STATUSES.contains(&p.status()))
            .max_by_key(Payment::paid))
    }

    /// Newest paid payment of the patron that is not registered yet.
    pub async fn get_paid_payment_in_progress_for_patron(
        &self,
        cat_username: &str,
    ) -> Result<Option<Payment>> {
        let payments = self.payments.all_payments().await?;
        Ok(payments
            .into_iter()
            .filter(|p| {
                p.cat_username() == cat_username && PAID_IN_PROGRESS_STATUSES.contains(&p.status())
            })
            .max_by_key(Payment::created))
    }

    /// Newest in-progress payment of the patron started recently.
    ///
    /// # Arguments
    ///
    /// * `cat_username` - Patron's catalog username.
    /// * `max_duration_minutes` - Only payments created strictly within this many
    ///   minutes before now are considered.
    pub async fn get_started_payment_for_patron(
        &self,
        cat_username: &str,
        max_duration_minutes: i64,
    ) -> Result<Option<Payment>> {
        let created_limit = self.now() - TimeDelta::minutes(max_duration_minutes);
        let payments = self.payments.all_payments().await?;
        Ok(payments
            .into_iter()
            .filter(|p| {
                p.cat_username() == cat_username
                    && p.status() == PaymentStatus::InProgress
                    && p.created().is_some_and(|created| created > created_limit)
            })
            .max_by_key(Payment::created))
    }

    /// Payments that need another registration attempt, oldest first.
    ///
    /// These are payments whose registration failed, plus payments that stayed
    /// paid longer than the minimum age without being registered.
    ///
    /// # Arguments
    ///
    /// * `minimum_paid_age_secs` - How long a paid payment may wait for its
    ///   first registration before it counts as failed.
    pub async fn get_failed_payments(&self, minimum_paid_age_secs: i64) -> Result<Vec<Payment>> {
        let now = self.now();
        let age = TimeDelta::seconds(minimum_paid_age_secs);
        let mut payments: Vec<Payment> = self
            .payments
            .all_payments()
            .await?
            .into_iter()
            .filter(|p| query::is_failed(p, age, now))
            .collect();
        payments.sort_by_key(Payment::created);
        Ok(payments)
    }

    /// Payments that cannot be retried and were not reported within the
    /// last `interval_minutes`, oldest first.
    pub async fn get_unresolved_payments_to_report(&self, interval_minutes: i64) -> Result<Vec<Payment>> {
        let now = self.now();
        let interval = TimeDelta::minutes(interval_minutes);
        let mut payments: Vec<Payment> = self
            .payments
            .all_payments()
            .await?
            .into_iter()
            .filter(|p| query::is_unresolved_to_report(p, interval, now))
            .collect();
        payments.sort_by_key(Payment::created);
        Ok(payments)
    }

    /// Filtered listing, newest first.
    ///
    /// # Arguments
    ///
    /// * `filter` - Criteria a payment must match. The default matches everything.
    /// * `page` - Which slice of the matches to return. Without a page every
    ///   match is returned. `total` always counts all matches.
    pub async fn search(&self, filter: &PaymentFilter, page: Option<Page>) -> Result<PaymentPage> {
        let mut matches: Vec<Payment> = self
            .payments
            .all_payments()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        matches.sort_by_key(|p| std::cmp::Reverse(p.created()));

        let total = matches.len();
        let items = match page {
            Some(page) => matches
                .into_iter()
                .skip(page.offset())
                .take(page.limit)
                .collect(),
            None => matches,
        };
        Ok(PaymentPage { items, total })
    }

    /// Distinct source ILS names across all payments, sorted.
    pub async fn unique_source_ils_list(&self) -> Result<Vec<String>> {
        let payments = self.payments.all_payments().await?;
        let sources: BTreeSet<String> = payments
            .into_iter()
            .map(|p| p.source_ils().to_string())
            .collect();
        Ok(sources.into_iter().collect())
    }

    pub async fn fees_for_payment(&self, payment_id: PaymentId) -> Result<Vec<PaymentFee>> {
        self.fees.fees_for_payment(payment_id).await
    }

    /// Non-empty ILS fine identifiers of the payment's fees.
    pub async fn fine_ids_for_payment(&self, payment_id: PaymentId) -> Result<Vec<String>> {
        let fees = self.fees.fees_for_payment(payment_id).await?;
        Ok(fees
            .into_iter()
            .map(|fee| fee.fine_id().to_string())
            .filter(|fine_id| !fine_id.is_empty())
            .collect())
    }

    /// Sum of the per-fee tax breakdowns of a payment.
    ///
    /// Each fee is rounded on its own before summing, so the total tax can
    /// differ from the tax computed on the summed amount.
    pub async fn payment_breakdown(&self, payment_id: PaymentId) -> Result<TaxBreakdown> {
        let fees = self.fees.fees_for_payment(payment_id).await?;
        Ok(fees.iter().map(PaymentFee::tax_breakdown).sum())
    }
}
