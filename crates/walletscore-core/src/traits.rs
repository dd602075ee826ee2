//! Trait interfaces between crates.
//!
//! - [`ActivitySource`] — per-wallet activity fetcher (implemented outside
//!   the scoring core; walletscore-features ships a file-backed one)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::activity::{DefiPosition, SwapEvent, WalletTransaction};
use crate::error::SourceError;

/// Read access to one wallet's raw on-chain activity.
///
/// Each method is an independent fetch. A failure degrades only the
/// feature family that depends on it.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Full transaction history, newest first or in any order.
    async fn transactions(&self, wallet: &str) -> Result<Vec<WalletTransaction>, SourceError>;

    /// Open DeFi positions.
    async fn defi_positions(&self, wallet: &str) -> Result<Vec<DefiPosition>, SourceError>;

    /// Total net worth across assets, in USD.
    async fn net_worth_usd(&self, wallet: &str) -> Result<f64, SourceError>;

    /// Timestamp of the wallet's first transaction, `None` if it has none.
    async fn creation_date(&self, wallet: &str) -> Result<Option<DateTime<Utc>>, SourceError>;

    /// DEX swap events.
    async fn swaps(&self, wallet: &str) -> Result<Vec<SwapEvent>, SourceError>;
}
