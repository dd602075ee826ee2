//! Decoded-method classification against the fixed vocabularies.
//!
//! All comparisons are case-insensitive, but the containment direction
//! differs per vocabulary:
//! - repayment: the label must be a substring of a repayment verb
//!   (`"repay"` matches `repayBorrow`, `"repayborrowbehalf"` does not match
//!   `repayBorrow` but matches `repayBorrowBehalf`). An empty label is a
//!   substring of every verb and therefore counts.
//! - liquidation: a liquidation verb must be a substring of the label
//!   (`"liquidateBorrowWithPermit"` matches `liquidateBorrow`).
//! - engagement history: exact membership.
//!
//! The repayment direction looks inverted relative to the liquidation one.
//! It is kept as-is so feature values stay comparable with previously
//! collected datasets.

use chrono::{DateTime, Utc};
use walletscore_core::activity::WalletTransaction;
use walletscore_core::constants::{HISTORY_METHODS, LIQUIDATE_METHODS, REPAY_METHODS};

/// Whether `label` is (case-insensitively) contained in any repayment verb.
pub fn is_repayment(label: &str) -> bool {
    let label = label.to_lowercase();
    REPAY_METHODS
        .iter()
        .any(|verb| verb.to_lowercase().contains(&label))
}

/// Whether any liquidation verb is (case-insensitively) contained in `label`.
pub fn is_liquidation(label: &str) -> bool {
    let label = label.to_lowercase();
    LIQUIDATE_METHODS
        .iter()
        .any(|verb| label.contains(&verb.to_lowercase()))
}

/// Whether `label` is exactly one of the lending/borrowing history verbs.
pub fn is_engagement(label: &str) -> bool {
    HISTORY_METHODS
        .iter()
        .any(|verb| verb.eq_ignore_ascii_case(label))
}

/// Number of transactions whose decoded label is a repayment.
pub fn count_repayments(transactions: &[WalletTransaction]) -> usize {
    transactions
        .iter()
        .filter_map(|tx| tx.method_label.as_deref())
        .filter(|label| is_repayment(label))
        .count()
}

/// Number of transactions whose decoded label is a liquidation.
pub fn count_liquidations(transactions: &[WalletTransaction]) -> usize {
    transactions
        .iter()
        .filter_map(|tx| tx.method_label.as_deref())
        .filter(|label| is_liquidation(label))
        .count()
}

/// Timestamp of the oldest lending/borrowing interaction, if any.
pub fn first_engagement(transactions: &[WalletTransaction]) -> Option<DateTime<Utc>> {
    transactions
        .iter()
        .filter(|tx| tx.method_label.as_deref().is_some_and(is_engagement))
        .map(|tx| tx.block_timestamp)
        .min()
}
