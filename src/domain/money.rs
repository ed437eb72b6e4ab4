use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::iter::Sum;
use std::ops::Add;

/// Tax percentages are stored in hundredths of a percent: 1000 is 10.00 %.
pub const TAX_PERCENT_SCALE: u32 = 4;

/// Returns the tax-exclusive part of a tax-inclusive amount.
///
/// Computes `amount / (1 + tax_percent / 10000)` in decimal arithmetic and rounds
/// half away from zero to the nearest minor unit. A rate of exactly -100 % has no
/// defined result and leaves the amount unchanged.
pub fn amount_excluding_tax(amount: i64, tax_percent: i32) -> i64 {
    let divisor = Decimal::ONE + Decimal::new(i64::from(tax_percent), TAX_PERCENT_SCALE);
    Decimal::from(amount)
        .checked_div(divisor)
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .unwrap_or(amount)
}

/// Returns the tax contained in a tax-inclusive amount.
pub fn tax_amount(amount: i64, tax_percent: i32) -> i64 {
    amount - amount_excluding_tax(amount, tax_percent)
}

/// Decomposition of a tax-inclusive amount.
///
/// Sums are accumulated per item, so the sum of several breakdowns may differ from
/// the breakdown of the summed amounts by up to half a unit per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaxBreakdown {
    pub amount: i64,
    pub excluding_tax: i64,
    pub tax: i64,
}

impl TaxBreakdown {
    pub fn new(amount: i64, tax_percent: i32) -> Self {
        let excluding_tax = amount_excluding_tax(amount, tax_percent);
        Self {
            amount,
            excluding_tax,
            tax: amount - excluding_tax,
        }
    }
}

impl Add for TaxBreakdown {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            amount: self.amount + rhs.amount,
            excluding_tax: self.excluding_tax + rhs.excluding_tax,
            tax: self.tax + rhs.tax,
        }
    }
}

impl Sum for TaxBreakdown {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}
