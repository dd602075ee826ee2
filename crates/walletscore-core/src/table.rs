//! Row-oriented tables passed between pipeline stages.
//!
//! - [`FeatureTable`] — wallet id + feature vector (raw, sanitized, augmented)
//! - [`LabeledTable`] — adds cluster, band and integer score
//! - [`BalancedTable`] — band-balanced rows for downstream model training

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::band::ScoreBand;
use crate::constants::{SYNTHETIC_TAG, SYNTHETIC_WALLET_MARKER};
use crate::features::{FeatureColumn, FeatureVector};

/// Identifier of a row: a wallet address or a synthetic exemplar tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Identifier of the `index`-th synthetic exemplar.
    pub fn synthetic(index: usize) -> Self {
        Self(format!("{SYNTHETIC_WALLET_MARKER}{index:04x}"))
    }

    pub fn is_synthetic(&self) -> bool {
        self.0.contains(SYNTHETIC_TAG)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WalletId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub wallet: WalletId,
    pub features: FeatureVector,
}

impl FeatureRow {
    pub fn new(wallet: impl Into<WalletId>, features: FeatureVector) -> Self {
        Self {
            wallet: wallet.into(),
            features,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.wallet.is_synthetic()
    }
}

/// Feature rows in a fixed order. Row position is the row's identity
/// inside a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [FeatureRow] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<FeatureRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }

    /// Append every row of `other` after the existing rows.
    pub fn append(&mut self, other: FeatureTable) {
        self.rows.extend(other.rows);
    }

    /// All values of one column, in row order.
    pub fn column(&self, column: FeatureColumn) -> Vec<f64> {
        self.rows.iter().map(|r| r.features.get(column)).collect()
    }

    pub fn feature_matrix(&self) -> Vec<FeatureVector> {
        self.rows.iter().map(|r| r.features).collect()
    }

    /// Number of synthetic exemplar rows.
    pub fn synthetic_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_synthetic()).count()
    }
}

impl FromIterator<FeatureRow> for FeatureTable {
    fn from_iter<I: IntoIterator<Item = FeatureRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A wallet row after clustering, ranking and quantile scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub wallet: WalletId,
    pub features: FeatureVector,
    pub cluster: usize,
    pub band: ScoreBand,
    pub score: u16,
}

impl LabeledRow {
    pub fn is_synthetic(&self) -> bool {
        self.wallet.is_synthetic()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabeledTable {
    rows: Vec<LabeledRow>,
}

impl LabeledTable {
    pub fn new(rows: Vec<LabeledRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[LabeledRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows describing real wallets, excluding synthetic exemplars.
    pub fn real_rows(&self) -> impl Iterator<Item = &LabeledRow> {
        self.rows.iter().filter(|r| !r.is_synthetic())
    }

    /// Row count per band, best to worst.
    pub fn band_counts(&self) -> [usize; 5] {
        let mut counts = [0; 5];
        for row in &self.rows {
            counts[row.band.rank()] += 1;
        }
        counts
    }

    pub fn score_of(&self, wallet: &WalletId) -> Option<u16> {
        self.rows.iter().find(|r| &r.wallet == wallet).map(|r| r.score)
    }
}

/// Whether a balanced row came from the labeled input or was interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrigin {
    Original,
    Synthesized,
}

/// A training row: features, band label and score. Wallet identity is
/// not carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancedRow {
    pub features: FeatureVector,
    pub band: ScoreBand,
    pub score: u16,
    pub origin: RowOrigin,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalancedTable {
    rows: Vec<BalancedRow>,
}

impl BalancedTable {
    pub fn new(rows: Vec<BalancedRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[BalancedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn band_counts(&self) -> [usize; 5] {
        let mut counts = [0; 5];
        for row in &self.rows {
            counts[row.band.rank()] += 1;
        }
        counts
    }

    pub fn synthesized_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.origin == RowOrigin::Synthesized)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(wallet: &str, band: ScoreBand, score: u16) -> LabeledRow {
        LabeledRow {
            wallet: WalletId::new(wallet),
            features: FeatureVector::zeroed(),
            cluster: 0,
            band,
            score,
        }
    }

    #[test]
    fn synthetic_ids_are_tagged_and_unique() {
        let a = WalletId::synthetic(0);
        let b = WalletId::synthetic(1);
        assert!(a.is_synthetic());
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "0x000000000000syntheticwallet0000");
        assert!(!WalletId::new("0xdeadbeef").is_synthetic());
    }

    #[test]
    fn column_extracts_in_row_order() {
        let table: FeatureTable = (0..3)
            .map(|i| {
                FeatureRow::new(
                    WalletId::new(format!("0x{i}")),
                    FeatureVector::zeroed().with(FeatureColumn::TokenSwapCount, i as f64),
                )
            })
            .collect();
        assert_eq!(table.column(FeatureColumn::TokenSwapCount), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn append_keeps_order_and_counts_synthetic() {
        let mut table = FeatureTable::new(vec![FeatureRow::new("0xa", FeatureVector::zeroed())]);
        table.append(FeatureTable::new(vec![FeatureRow::new(
            WalletId::synthetic(0),
            FeatureVector::zeroed(),
        )]));
        assert_eq!(table.len(), 2);
        assert_eq!(table.synthetic_count(), 1);
        assert_eq!(table.rows()[0].wallet.as_str(), "0xa");
    }

    #[test]
    fn real_rows_skip_synthetic() {
        let table = LabeledTable::new(vec![
            labeled("0xa", ScoreBand::Good, 700),
            labeled(WalletId::synthetic(3).as_str(), ScoreBand::Poor, 400),
        ]);
        assert_eq!(table.real_rows().count(), 1);
        assert_eq!(table.band_counts(), [0, 0, 1, 0, 1]);
        assert_eq!(table.score_of(&WalletId::new("0xa")), Some(700));
    }

    #[test]
    fn table_json_is_a_plain_array() {
        let table = FeatureTable::new(vec![FeatureRow::new("0xa", FeatureVector::zeroed())]);
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["wallet"], "0xa");
        let back: FeatureTable = serde_json::from_value(json).unwrap();
        assert_eq!(back, table);
    }
}
