use super::money::{self, TaxBreakdown};
use super::payment::PaymentId;

pub type FeeId = u64;

/// Character limit of the free-text fee columns.
pub const TEXT_MAX_CHARS: usize = 255;
pub const CURRENCY_MAX_CHARS: usize = 3;

/// A single fine paid as part of a [`Payment`](super::payment::Payment).
///
/// Text fields are clamped on write, counting characters rather than bytes.
/// `fine_id` is the exception: it is stored as given so that an oversized ILS
/// identifier is rejected by the store instead of being cut.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentFee {
    pub(crate) id: Option<FeeId>,
    pub(crate) payment_id: PaymentId,
    pub(crate) title: String,
    pub(crate) fee_type: String,
    pub(crate) description: String,
    pub(crate) amount: i64,
    pub(crate) tax_percent: i32,
    pub(crate) currency: String,
    pub(crate) fine_id: String,
    pub(crate) organization: String,
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

impl PaymentFee {
    pub fn new(payment_id: PaymentId) -> Self {
        Self {
            payment_id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<FeeId> {
        self.id
    }

    pub fn payment_id(&self) -> PaymentId {
        self.payment_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = truncate_chars(title, TEXT_MAX_CHARS);
        self
    }

    pub fn fee_type(&self) -> &str {
        &self.fee_type
    }

    pub fn set_fee_type(&mut self, fee_type: &str) -> &mut Self {
        self.fee_type = truncate_chars(fee_type, TEXT_MAX_CHARS);
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: &str) -> &mut Self {
        self.description = truncate_chars(description, TEXT_MAX_CHARS);
        self
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Tax-inclusive amount in minor units.
    pub fn set_amount(&mut self, amount: i64) -> &mut Self {
        self.amount = amount;
        self
    }

    pub fn tax_percent(&self) -> i32 {
        self.tax_percent
    }

    /// Tax rate in hundredths of a percent.
    pub fn set_tax_percent(&mut self, tax_percent: i32) -> &mut Self {
        self.tax_percent = tax_percent;
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn set_currency(&mut self, currency: &str) -> &mut Self {
        self.currency = truncate_chars(currency, CURRENCY_MAX_CHARS);
        self
    }

    pub fn fine_id(&self) -> &str {
        &self.fine_id
    }

    /// Not truncated, see the type documentation.
    pub fn set_fine_id(&mut self, fine_id: impl Into<String>) -> &mut Self {
        self.fine_id = fine_id.into();
        self
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn set_organization(&mut self, organization: &str) -> &mut Self {
        self.organization = truncate_chars(organization, TEXT_MAX_CHARS);
        self
    }

    pub fn calculate_amount_excluding_tax(&self) -> i64 {
        money::amount_excluding_tax(self.amount, self.tax_percent)
    }

    pub fn calculate_tax(&self) -> i64 {
        money::tax_amount(self.amount, self.tax_percent)
    }

    pub fn tax_breakdown(&self) -> TaxBreakdown {
        TaxBreakdown::new(self.amount, self.tax_percent)
    }
}
