//! Synthetic exemplars encoding known risk relationships.
//!
//! Three independently parameterised groups are generated:
//! - health-driven: health factor above 1.5 pairs with low debt, low
//!   debt-to-asset and high repayment activity; below with the opposite
//! - repayment-driven: repayment activity of 50 or more pairs with low
//!   debt and a high health factor
//! - liquidation-driven: each liquidation halves the health factor from a
//!   base of 3 and doubles the sampled debt
//!
//! All other columns hold fixed base values. Generated wallets carry the
//! synthetic marker prefix so they can be filtered from real-wallet
//! statistics.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use walletscore_core::features::{FeatureColumn as C, FeatureVector};
use walletscore_core::table::{FeatureRow, FeatureTable, WalletId};

use crate::config::SyntheticConfig;

const BASE_TRANSACTION_FREQUENCY: f64 = 12.0;
const BASE_TRANSACTION_VOLUME: f64 = 500.0;

/// Fixed values shared by every exemplar.
fn base_vector() -> FeatureVector {
    FeatureVector::zeroed()
        .with(C::TransactionFrequency, BASE_TRANSACTION_FREQUENCY)
        .with(C::TransactionVolume, BASE_TRANSACTION_VOLUME)
        .with(C::LargestTransaction, 50.0)
        .with(C::AverageTransactionValue, 2.5)
        .with(C::CollateralUtilization, 0.5)
        .with(C::EarningsEfficiency, 0.05)
        .with(C::ProtocolDiversity, 2.0)
        .with(C::LendingProtocolCount, 1.0)
        .with(C::LiquidityProvisionCount, 0.5)
        .with(C::TokenSwapCount, 5.0)
        .with(C::WalletAgeDays, 730.0)
        .with(C::DefiEngagementDays, 365.0)
}

#[derive(Debug, Clone)]
pub struct SyntheticExemplarInjector {
    group_size: usize,
    seed: u64,
}

impl SyntheticExemplarInjector {
    pub fn new(group_size: usize, seed: u64) -> Self {
        Self { group_size, seed }
    }

    pub fn from_config(config: &SyntheticConfig) -> Self {
        Self::new(config.group_size, config.seed)
    }

    /// Total rows produced by [`generate`](Self::generate).
    pub fn row_count(&self) -> usize {
        self.group_size * 3
    }

    /// Generate all three groups, in order. The same seed always yields
    /// the same rows.
    pub fn generate(&self) -> Vec<FeatureRow> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows = Vec::with_capacity(self.row_count());
        let groups: [fn(&mut StdRng) -> FeatureVector; 3] =
            [health_exemplar, repayment_exemplar, liquidation_exemplar];
        for sample in groups {
            for _ in 0..self.group_size {
                let id = WalletId::synthetic(rows.len());
                rows.push(FeatureRow::new(id, sample(&mut rng)));
            }
        }
        rows
    }

    /// Append the generated exemplars to `table`.
    pub fn inject(&self, mut table: FeatureTable) -> FeatureTable {
        let real = table.len();
        for row in self.generate() {
            table.push(row);
        }
        info!(real, synthetic = self.row_count(), "injected synthetic exemplars");
        table
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn uniform(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    rng.gen_range(lo..=hi)
}

fn average_debt(debt: f64) -> f64 {
    round_to(debt / (BASE_TRANSACTION_FREQUENCY + 1.0), 2)
}

fn health_exemplar(rng: &mut StdRng) -> FeatureVector {
    let health = round_to(uniform(rng, 0.1, 3.0), 4);
    let (debt, dta, repayment) = if health > 1.5 {
        (
            round_to(uniform(rng, 0.0, 50_000.0), 2),
            round_to(uniform(rng, 0.0, 0.5), 4),
            round_to(uniform(rng, 50.0, 100.0), 2),
        )
    } else {
        (
            round_to(uniform(rng, 50_000.0, 200_000.0), 2),
            round_to(uniform(rng, 0.5, 2.0), 4),
            round_to(uniform(rng, 0.0, 50.0), 2),
        )
    };
    base_vector()
        .with(C::AverageHealthFactor, health)
        .with(C::TotalOutstandingDebt, debt)
        .with(C::AverageDebtSize, average_debt(debt))
        .with(C::DebtToAssetRatio, dta)
        .with(C::RepaymentActivity, repayment)
}

fn repayment_exemplar(rng: &mut StdRng) -> FeatureVector {
    let repayment = round_to(uniform(rng, 0.0, 100.0), 2);
    let (debt, health) = if repayment >= 50.0 {
        (
            round_to(uniform(rng, 0.0, 50_000.0), 2),
            round_to(uniform(rng, 1.5, 3.0), 4),
        )
    } else {
        (
            round_to(uniform(rng, 50_000.0, 200_000.0), 2),
            round_to(uniform(rng, 0.1, 1.5), 4),
        )
    };
    base_vector()
        .with(C::AverageHealthFactor, health)
        .with(C::TotalOutstandingDebt, debt)
        .with(C::AverageDebtSize, average_debt(debt))
        .with(C::DebtToAssetRatio, round_to(debt / (BASE_TRANSACTION_VOLUME + 1.0), 4))
        .with(C::RepaymentActivity, repayment)
}

fn liquidation_exemplar(rng: &mut StdRng) -> FeatureVector {
    let liquidations: i32 = rng.gen_range(0..=5);
    let (health, debt, dta, repayment) = if liquidations == 0 {
        (
            round_to(uniform(rng, 1.5, 3.0), 4),
            0.0,
            0.0,
            round_to(uniform(rng, 50.0, 100.0), 2),
        )
    } else {
        let n = f64::from(liquidations);
        (
            round_to(3.0 * 0.5f64.powi(liquidations), 4),
            round_to(uniform(rng, 10_000.0, 200_000.0) * 2f64.powi(liquidations), 2),
            round_to(uniform(rng, 0.5, 2.0) * n, 4),
            round_to(100.0 / (n + 1.0), 2),
        )
    };
    base_vector()
        .with(C::LiquidationEventCount, f64::from(liquidations))
        .with(C::AverageHealthFactor, health)
        .with(C::TotalOutstandingDebt, debt)
        .with(C::AverageDebtSize, average_debt(debt))
        .with(C::DebtToAssetRatio, dta)
        .with(C::RepaymentActivity, repayment)
}
