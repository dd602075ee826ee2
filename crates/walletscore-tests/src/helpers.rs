//! Shared fixtures for scenario and pipeline tests.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use walletscore_core::activity::{DefiPosition, SwapEvent, WalletActivity, WalletTransaction};
use walletscore_core::error::SourceError;
use walletscore_core::features::{FeatureColumn as C, FeatureVector};
use walletscore_core::table::{FeatureRow, FeatureTable};
use walletscore_core::traits::ActivitySource;
use walletscore_features::MemorySource;

pub const ETH: u128 = 1_000_000_000_000_000_000;

/// Fixed aggregation clock used across tests.
pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

/// Key risk metrics of a wallet archetype.
#[derive(Debug, Clone, Copy)]
pub struct Profile {
    pub health: f64,
    pub liquidations: f64,
    pub debt: f64,
    pub debt_to_asset: f64,
    pub repayments: f64,
}

pub const SAFE: Profile = Profile {
    health: 2.5,
    liquidations: 0.0,
    debt: 5_000.0,
    debt_to_asset: 0.2,
    repayments: 60.0,
};

pub const RISKY: Profile = Profile {
    health: 0.1,
    liquidations: 3.0,
    debt: 150_000.0,
    debt_to_asset: 2.3,
    repayments: 10.0,
};

pub const ARCHETYPES: [Profile; 5] = [
    SAFE,
    Profile { health: 3.0, liquidations: 0.0, debt: 0.0, debt_to_asset: 0.0, repayments: 80.0 },
    Profile { health: 1.4, liquidations: 1.0, debt: 40_000.0, debt_to_asset: 0.8, repayments: 35.0 },
    Profile { health: 0.8, liquidations: 2.0, debt: 90_000.0, debt_to_asset: 1.5, repayments: 20.0 },
    RISKY,
];

/// A feature vector for `profile`. Non-key columns sit at typical
/// exemplar values; the key metrics get a small deterministic jitter.
pub fn vector(profile: Profile, jitter: usize) -> FeatureVector {
    let j = 1.0 + (jitter % 10) as f64 * 0.005;
    FeatureVector::zeroed()
        .with(C::TransactionFrequency, 12.0)
        .with(C::TransactionVolume, 500.0)
        .with(C::LargestTransaction, 50.0)
        .with(C::AverageTransactionValue, 2.5)
        .with(C::LiquidationEventCount, profile.liquidations)
        .with(C::AverageHealthFactor, profile.health * j)
        .with(C::CollateralUtilization, 0.5)
        .with(C::TotalOutstandingDebt, profile.debt * j)
        .with(C::AverageDebtSize, profile.debt * j / 13.0)
        .with(C::DebtToAssetRatio, profile.debt_to_asset * j)
        .with(C::RepaymentActivity, profile.repayments)
        .with(C::EarningsEfficiency, 0.05)
        .with(C::ProtocolDiversity, 2.0)
        .with(C::LendingProtocolCount, 1.0)
        .with(C::LiquidityProvisionCount, 0.5)
        .with(C::TokenSwapCount, 5.0)
        .with(C::WalletAgeDays, 730.0)
        .with(C::DefiEngagementDays, 365.0)
}

/// `per_archetype` real wallets for each archetype, named `0x<arch><n>`.
pub fn population(per_archetype: usize) -> FeatureTable {
    let mut rows = Vec::new();
    for (a, profile) in ARCHETYPES.iter().enumerate() {
        for n in 0..per_archetype {
            rows.push(FeatureRow::new(format!("0x{a}{n:03}").as_str(), vector(*profile, n)));
        }
    }
    rows.into_iter().collect()
}

/// Activity for a lending wallet with the given position health factor.
pub fn lending_activity(address: &str, health_factor: Option<f64>) -> WalletActivity {
    let created = as_of() - Duration::days(400);
    WalletActivity {
        address: address.to_string(),
        transactions: Some(vec![
            WalletTransaction::new(3 * ETH, created + Duration::days(10)).with_method("deposit"),
            WalletTransaction::new(0, created + Duration::days(40)).with_method("borrow"),
            WalletTransaction::new(ETH, created + Duration::days(90)).with_method("repay"),
        ]),
        defi_positions: Some(vec![
            DefiPosition {
                protocol_name: Some("aave".into()),
                balance_usd: 20_000.0,
                is_enabled_as_collateral: true,
                projected_yearly_earnings_usd: Some(400.0),
                health_factor,
                ..DefiPosition::default()
            },
            DefiPosition {
                protocol_name: Some("aave".into()),
                balance_usd: 5_000.0,
                is_debt: true,
                health_factor,
                ..DefiPosition::default()
            },
        ]),
        swaps: Some(vec![SwapEvent { transaction_type: "buy".into() }]),
        net_worth_usd: Some(15_000.0),
        created_at: Some(created),
    }
}

/// Activity for a wallet that has transacted but never opened a position.
pub fn idle_activity(address: &str) -> WalletActivity {
    WalletActivity {
        defi_positions: Some(Vec::new()),
        ..lending_activity(address, None)
    }
}

/// Wraps a [`MemorySource`] and fails the named sections for every wallet.
pub struct FlakySource {
    inner: MemorySource,
    failing: HashSet<&'static str>,
}

impl FlakySource {
    pub fn new(inner: MemorySource, failing: &[&'static str]) -> Self {
        Self {
            inner,
            failing: failing.iter().copied().collect(),
        }
    }

    fn check(&self, wallet: &str, section: &'static str) -> Result<(), SourceError> {
        if self.failing.contains(section) {
            return Err(SourceError::Request(format!("{section} timed out for {wallet}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ActivitySource for FlakySource {
    async fn transactions(&self, wallet: &str) -> Result<Vec<WalletTransaction>, SourceError> {
        self.check(wallet, "transactions")?;
        self.inner.transactions(wallet).await
    }

    async fn defi_positions(&self, wallet: &str) -> Result<Vec<DefiPosition>, SourceError> {
        self.check(wallet, "positions")?;
        self.inner.defi_positions(wallet).await
    }

    async fn net_worth_usd(&self, wallet: &str) -> Result<f64, SourceError> {
        self.check(wallet, "net_worth")?;
        self.inner.net_worth_usd(wallet).await
    }

    async fn creation_date(&self, wallet: &str) -> Result<Option<DateTime<Utc>>, SourceError> {
        self.check(wallet, "creation_date")?;
        self.inner.creation_date(wallet).await
    }

    async fn swaps(&self, wallet: &str) -> Result<Vec<SwapEvent>, SourceError> {
        self.check(wallet, "swaps")?;
        self.inner.swaps(wallet).await
    }
}
