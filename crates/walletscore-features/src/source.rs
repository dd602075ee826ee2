//! [`ActivitySource`] implementations backed by exported
//! [`WalletActivity`] documents.
//!
//! - [`MemorySource`] — documents held in memory, keyed by address
//! - [`JsonDirSource`] — one `<address>.json` document per wallet on disk
//!
//! A section that is `None` in the document reports
//! [`SourceError::Unavailable`], so the aggregator's degradation path can be
//! exercised offline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use walletscore_core::activity::{DefiPosition, SwapEvent, WalletActivity, WalletTransaction};
use walletscore_core::error::SourceError;
use walletscore_core::traits::ActivitySource;

fn section<T: Clone>(
    activity: &WalletActivity,
    name: &'static str,
    value: &Option<T>,
) -> Result<T, SourceError> {
    value.clone().ok_or_else(|| SourceError::Unavailable {
        wallet: activity.address.clone(),
        section: name,
    })
}

fn creation_date(activity: &WalletActivity) -> Result<Option<DateTime<Utc>>, SourceError> {
    if activity.created_at.is_some() {
        return Ok(activity.created_at);
    }
    let txs = section(activity, "creation date", &activity.transactions)?;
    Ok(txs.iter().map(|tx| tx.block_timestamp).min())
}

/// In-memory activity documents, keyed by lowercase address.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    wallets: HashMap<String, WalletActivity>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, activity: WalletActivity) {
        self.wallets.insert(activity.address.to_lowercase(), activity);
    }

    pub fn with(mut self, activity: WalletActivity) -> Self {
        self.insert(activity);
        self
    }

    fn get(&self, wallet: &str) -> Result<&WalletActivity, SourceError> {
        self.wallets
            .get(&wallet.to_lowercase())
            .ok_or_else(|| SourceError::NotFound(wallet.to_string()))
    }
}

#[async_trait]
impl ActivitySource for MemorySource {
    async fn transactions(&self, wallet: &str) -> Result<Vec<WalletTransaction>, SourceError> {
        let a = self.get(wallet)?;
        section(a, "transactions", &a.transactions)
    }

    async fn defi_positions(&self, wallet: &str) -> Result<Vec<DefiPosition>, SourceError> {
        let a = self.get(wallet)?;
        section(a, "defi positions", &a.defi_positions)
    }

    async fn net_worth_usd(&self, wallet: &str) -> Result<f64, SourceError> {
        let a = self.get(wallet)?;
        section(a, "net worth", &a.net_worth_usd)
    }

    async fn creation_date(&self, wallet: &str) -> Result<Option<DateTime<Utc>>, SourceError> {
        creation_date(self.get(wallet)?)
    }

    async fn swaps(&self, wallet: &str) -> Result<Vec<SwapEvent>, SourceError> {
        let a = self.get(wallet)?;
        section(a, "swaps", &a.swaps)
    }
}

/// Reads `<dir>/<address>.json` on every call.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document path for `wallet`. Addresses that could name a file
    /// outside `dir` are treated as unknown.
    fn path_for(&self, wallet: &str) -> Result<PathBuf, SourceError> {
        let escapes = wallet.is_empty()
            || wallet.contains(['/', '\\', '\0'])
            || wallet.contains("..");
        if escapes {
            return Err(SourceError::NotFound(wallet.to_string()));
        }
        Ok(self.dir.join(format!("{wallet}.json")))
    }

    async fn load(&self, wallet: &str) -> Result<WalletActivity, SourceError> {
        let path = self.path_for(wallet)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(wallet.to_string()));
            }
            Err(e) => return Err(SourceError::Request(format!("{}: {e}", path.display()))),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Decode(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl ActivitySource for JsonDirSource {
    async fn transactions(&self, wallet: &str) -> Result<Vec<WalletTransaction>, SourceError> {
        let a = self.load(wallet).await?;
        section(&a, "transactions", &a.transactions)
    }

    async fn defi_positions(&self, wallet: &str) -> Result<Vec<DefiPosition>, SourceError> {
        let a = self.load(wallet).await?;
        section(&a, "defi positions", &a.defi_positions)
    }

    async fn net_worth_usd(&self, wallet: &str) -> Result<f64, SourceError> {
        let a = self.load(wallet).await?;
        section(&a, "net worth", &a.net_worth_usd)
    }

    async fn creation_date(&self, wallet: &str) -> Result<Option<DateTime<Utc>>, SourceError> {
        creation_date(&self.load(wallet).await?)
    }

    async fn swaps(&self, wallet: &str) -> Result<Vec<SwapEvent>, SourceError> {
        let a = self.load(wallet).await?;
        section(&a, "swaps", &a.swaps)
    }
}
