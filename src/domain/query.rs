//! Selection rules for payments.
//!
//! Stores only know how to load and save; the workflow queries are expressed here
//! as pure predicates so every backend answers them the same way.

use super::payment::Payment;
use super::status::PaymentStatus;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Statuses of payments where money was collected.
pub const PAID_STATUSES: [PaymentStatus; 6] = [
    PaymentStatus::Completed,
    PaymentStatus::Paid,
    PaymentStatus::RegistrationFailed,
    PaymentStatus::RegistrationExpired,
    PaymentStatus::RegistrationResolved,
    PaymentStatus::FinesUpdated,
];

/// Statuses of paid payments that still wait for the ILS.
pub const PAID_IN_PROGRESS_STATUSES: [PaymentStatus; 4] = [
    PaymentStatus::Paid,
    PaymentStatus::RegistrationFailed,
    PaymentStatus::RegistrationExpired,
    PaymentStatus::FinesUpdated,
];

/// Statuses that need staff attention because registration will not be retried.
pub const UNRESOLVED_STATUSES: [PaymentStatus; 2] =
    [PaymentStatus::FinesUpdated, PaymentStatus::RegistrationExpired];

/// A paid payment whose registration failed, or which has stayed paid but
/// unregistered for longer than `minimum_paid_age`.
pub fn is_failed(payment: &Payment, minimum_paid_age: TimeDelta, now: DateTime<Utc>) -> bool {
    let Some(paid) = payment.paid() else {
        return false;
    };
    match payment.status() {
        PaymentStatus::RegistrationFailed => true,
        PaymentStatus::Paid => paid < now - minimum_paid_age,
        _ => false,
    }
}

/// A paid payment that cannot be retried and has not been reported within
/// `interval`. A payment that was never reported always qualifies.
pub fn is_unresolved_to_report(payment: &Payment, interval: TimeDelta, now: DateTime<Utc>) -> bool {
    UNRESOLVED_STATUSES.contains(&payment.status())
        && payment.paid().is_some()
        && payment
            .reported()
            .is_none_or(|reported| reported < now - interval)
}

/// Matches `value` against a SQL `LIKE` pattern where `%` matches any run of
/// characters and `_` matches exactly one.
pub fn like(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();
    let (mut p, mut v) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, v));
                p += 1;
            }
            Some(&c) if c == '_' || c == value[v] => {
                p += 1;
                v += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    v = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

/// Admin search over payments. Empty fields do not restrict the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub statuses: Vec<PaymentStatus>,
    pub local_identifier: Option<String>,
    pub remote_identifier: Option<String>,
    pub source_ils: Option<String>,
    pub cat_username: Option<String>,
    pub created_from: Option<NaiveDate>,
    /// Inclusive: the whole day is part of the range.
    pub created_until: Option<NaiveDate>,
    pub paid_from: Option<NaiveDate>,
    /// Inclusive: the whole day is part of the range.
    pub paid_until: Option<NaiveDate>,
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn within(value: Option<DateTime<Utc>>, from: Option<NaiveDate>, until: Option<NaiveDate>) -> bool {
    if from.is_none() && until.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    from.is_none_or(|from| value >= day_start(from))
        && until.is_none_or(|until| {
            until
                .succ_opt()
                .is_none_or(|next_day| value < day_start(next_day))
        })
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        let pattern_matches = |pattern: &Option<String>, value: Option<&str>| match pattern {
            Some(pattern) => value.is_some_and(|value| like(pattern, value)),
            None => true,
        };

        (self.statuses.is_empty() || self.statuses.contains(&payment.status()))
            && pattern_matches(&self.local_identifier, Some(payment.local_identifier()))
            && pattern_matches(&self.remote_identifier, payment.remote_identifier())
            && pattern_matches(&self.source_ils, Some(payment.source_ils()))
            && pattern_matches(&self.cat_username, Some(payment.cat_username()))
            && within(payment.created(), self.created_from, self.created_until)
            && within(payment.paid(), self.paid_from, self.paid_until)
    }
}

/// One page of search results. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub limit: usize,
}

impl Page {
    pub const DEFAULT_LIMIT: usize = 20;

    pub fn new(number: usize) -> Self {
        Self {
            number,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    pub fn offset(&self) -> usize {
        self.number.saturating_sub(1) * self.limit
    }
}
