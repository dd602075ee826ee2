//! Typed records for raw wallet activity, validated once at the
//! aggregation boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transaction from a wallet's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Transferred value in wei.
    #[serde(rename = "value", with = "wei", default)]
    pub value_wei: u128,
    pub block_timestamp: DateTime<Utc>,
    /// Decoded contract method label, when the call could be decoded.
    #[serde(default, alias = "method")]
    pub method_label: Option<String>,
}

impl WalletTransaction {
    pub fn new(value_wei: u128, block_timestamp: DateTime<Utc>) -> Self {
        Self {
            value_wei,
            block_timestamp,
            method_label: None,
        }
    }

    pub fn with_method(mut self, label: impl Into<String>) -> Self {
        self.method_label = Some(label.into());
        self
    }
}

/// A DeFi position with its account-level solvency data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefiPosition {
    #[serde(default)]
    pub protocol_name: Option<String>,
    #[serde(default)]
    pub balance_usd: f64,
    #[serde(default)]
    pub is_enabled_as_collateral: bool,
    #[serde(default)]
    pub is_debt: bool,
    #[serde(default)]
    pub liquidity: f64,
    #[serde(default)]
    pub reserves: Vec<String>,
    #[serde(default)]
    pub pool_address: Option<String>,
    #[serde(default)]
    pub share_of_pool: f64,
    #[serde(default)]
    pub projected_yearly_earnings_usd: Option<f64>,
    #[serde(default)]
    pub health_factor: Option<f64>,
    #[serde(default)]
    pub net_apy: Option<f64>,
}

impl DefiPosition {
    /// Whether the position carries liquidity-pool attributes.
    pub fn is_liquidity(&self) -> bool {
        self.liquidity > 0.0
            || !self.reserves.is_empty()
            || self.pool_address.as_deref().is_some_and(|a| !a.is_empty())
            || self.share_of_pool > 0.0
    }
}

/// A DEX swap event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEvent {
    #[serde(rename = "transactionType", alias = "transaction_type")]
    pub transaction_type: String,
}

/// Everything known about one wallet, as exported by an activity fetcher.
///
/// A `None` section means the fetch for that section failed or was not
/// performed; an empty list means it succeeded and found nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletActivity {
    pub address: String,
    #[serde(default)]
    pub transactions: Option<Vec<WalletTransaction>>,
    #[serde(default)]
    pub defi_positions: Option<Vec<DefiPosition>>,
    #[serde(default)]
    pub swaps: Option<Vec<SwapEvent>>,
    #[serde(default)]
    pub net_worth_usd: Option<f64>,
    /// Timestamp of the wallet's first transaction.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Wei amounts arrive as decimal strings (they overflow `u64`) or as
/// plain JSON numbers.
pub mod wei {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        struct WeiVisitor;

        impl Visitor<'_> for WeiVisitor {
            type Value = u128;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer wei amount")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(u128::from(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                u128::try_from(v).map_err(|_| E::custom(format!("negative wei amount: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    return Ok(0);
                }
                trimmed
                    .parse()
                    .map_err(|_| E::custom(format!("invalid wei amount: {v:?}")))
            }

            fn visit_unit<E: de::Error>(self) -> Result<u128, E> {
                Ok(0)
            }
        }

        deserializer.deserialize_any(WeiVisitor)
    }
}
