//! The fixed-schema wallet feature vector.
//!
//! Every stage of the pipeline sees the same ordered set of
//! [`FEATURE_COUNT`] columns. Before sanitization a cell may hold `NaN`
//! (missing) or `±inf` (unbounded); afterwards every cell is finite.
//!
//! On the wire a vector is a JSON object keyed by the column display names.
//! Missing cells are `null` and infinities are the strings `"Infinity"` /
//! `"-Infinity"`, since JSON has no literal for either.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::constants::FEATURE_COUNT;
use crate::error::TableError;

/// One named column of the feature schema, in schema order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureColumn {
    // Transaction history
    TransactionFrequency,
    TransactionVolume,
    LargestTransaction,
    AverageTransactionValue,
    // Liquidation / health
    LiquidationEventCount,
    AverageHealthFactor,
    CollateralUtilization,
    // Debt / repayment
    TotalOutstandingDebt,
    AverageDebtSize,
    DebtToAssetRatio,
    RepaymentActivity,
    EarningsEfficiency,
    // Credit mix / tenure
    ProtocolDiversity,
    LendingProtocolCount,
    LiquidityProvisionCount,
    TokenSwapCount,
    WalletAgeDays,
    DefiEngagementDays,
}

impl FeatureColumn {
    /// All columns in schema order.
    pub const ALL: [FeatureColumn; FEATURE_COUNT] = [
        Self::TransactionFrequency,
        Self::TransactionVolume,
        Self::LargestTransaction,
        Self::AverageTransactionValue,
        Self::LiquidationEventCount,
        Self::AverageHealthFactor,
        Self::CollateralUtilization,
        Self::TotalOutstandingDebt,
        Self::AverageDebtSize,
        Self::DebtToAssetRatio,
        Self::RepaymentActivity,
        Self::EarningsEfficiency,
        Self::ProtocolDiversity,
        Self::LendingProtocolCount,
        Self::LiquidityProvisionCount,
        Self::TokenSwapCount,
        Self::WalletAgeDays,
        Self::DefiEngagementDays,
    ];

    /// Position of this column in a [`FeatureVector`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable column name used in exported tables.
    pub fn name(self) -> &'static str {
        match self {
            Self::TransactionFrequency => "Transaction Frequency",
            Self::TransactionVolume => "Transaction Volume (ETH)",
            Self::LargestTransaction => "Largest Transaction (ETH)",
            Self::AverageTransactionValue => "Average Transaction Value (ETH)",
            Self::LiquidationEventCount => "Liquidation Event Count",
            Self::AverageHealthFactor => "Average Health Factor",
            Self::CollateralUtilization => "Collateral Utilization",
            Self::TotalOutstandingDebt => "Total Outstanding Debt (USD)",
            Self::AverageDebtSize => "Average Debt Size (USD)",
            Self::DebtToAssetRatio => "Debt-to-Asset Ratio",
            Self::RepaymentActivity => "Repayment Activity Proxy",
            Self::EarningsEfficiency => "Earnings Efficiency",
            Self::ProtocolDiversity => "Protocol Diversity",
            Self::LendingProtocolCount => "Lending Protocol Count",
            Self::LiquidityProvisionCount => "Liquidity Provision Count",
            Self::TokenSwapCount => "Token Swap Count",
            Self::WalletAgeDays => "Wallet Age (Days)",
            Self::DefiEngagementDays => "DeFi Engagement Duration (Days)",
        }
    }

    /// Look a column up by its display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name.trim())
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered vector of [`FEATURE_COUNT`] numeric features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// A vector with every feature set to zero.
    pub const fn zeroed() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    pub fn get(&self, column: FeatureColumn) -> f64 {
        self.0[column.index()]
    }

    pub fn set(&mut self, column: FeatureColumn, value: f64) {
        self.0[column.index()] = value;
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, column: FeatureColumn, value: f64) -> Self {
        self.set(column, value);
        self
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    /// `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureColumn, f64)> + '_ {
        FeatureColumn::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// First column holding a non-finite (missing or infinite) value.
    pub fn first_non_finite(&self) -> Option<FeatureColumn> {
        self.iter().find(|(_, v)| !v.is_finite()).map(|(c, _)| c)
    }

    pub fn is_finite(&self) -> bool {
        self.first_non_finite().is_none()
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Index<FeatureColumn> for FeatureVector {
    type Output = f64;

    fn index(&self, column: FeatureColumn) -> &f64 {
        &self.0[column.index()]
    }
}

impl IndexMut<FeatureColumn> for FeatureVector {
    fn index_mut(&mut self, column: FeatureColumn) -> &mut f64 {
        &mut self.0[column.index()]
    }
}

/// Wire form of a single cell.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Cell {
    Number(f64),
    Text(String),
}

fn encode_cell(value: f64) -> Option<Cell> {
    if value.is_nan() {
        None
    } else if value == f64::INFINITY {
        Some(Cell::Text("Infinity".into()))
    } else if value == f64::NEG_INFINITY {
        Some(Cell::Text("-Infinity".into()))
    } else {
        Some(Cell::Number(value))
    }
}

fn decode_cell(column: FeatureColumn, cell: Option<Cell>) -> Result<f64, TableError> {
    match cell {
        None => Ok(f64::NAN),
        Some(Cell::Number(v)) => Ok(v),
        Some(Cell::Text(text)) => match text.trim() {
            "Infinity" | "inf" | "+Infinity" => Ok(f64::INFINITY),
            "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
            "" | "NaN" | "nan" => Ok(f64::NAN),
            other => other.parse::<f64>().map_err(|_| TableError::InvalidValue {
                column: column.name().to_string(),
                value: text.clone(),
            }),
        },
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column.name(), &encode_cell(value))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw: BTreeMap<String, Option<Cell>> = BTreeMap::deserialize(deserializer)?;
        let mut values = [0.0; FEATURE_COUNT];
        for column in FeatureColumn::ALL {
            let cell = raw
                .remove(column.name())
                .ok_or_else(|| de::Error::custom(TableError::MissingColumn(column.name().into())))?;
            values[column.index()] = decode_cell(column, cell).map_err(de::Error::custom)?;
        }
        if let Some(unknown) = raw.keys().next() {
            return Err(de::Error::custom(format!("unknown column: {unknown}")));
        }
        Ok(Self(values))
    }
}
