//! Turns one wallet's raw activity into a [`FeatureVector`].
//!
//! Features are computed in four families. Each family depends on a
//! subset of the upstream fetches; when one of those fetches fails the
//! family falls back to its documented defaults and a warning is logged.
//! Only a wallet for which *every* fetch failed is rejected.
//!
//! | Family | Needs | Default |
//! |---|---|---|
//! | transaction history | transactions + creation date | all 0 |
//! | liquidation / health | positions (non-empty) | 0, 0.0, 0.0 |
//! | debt / repayment | positions (non-empty) | all 0 |
//! | credit mix | positions (non-empty) | all 0 |
//! | tenure | creation date | 0, 0 |
//!
//! A wallet without positions reports a health factor of `0.0`, not the
//! unbounded sentinel. Downstream stages must not read that as "healthy".

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};
use walletscore_core::activity::{DefiPosition, SwapEvent, WalletTransaction};
use walletscore_core::constants::{SWAP_TRANSACTION_TYPES, WEI_PER_ETH};
use walletscore_core::error::{FeatureError, SourceError};
use walletscore_core::features::{FeatureColumn as C, FeatureVector};
use walletscore_core::traits::ActivitySource;

use crate::methods::{count_liquidations, count_repayments, first_engagement};
use crate::positions::{round_to, PositionSummary};

/// Settings for feature aggregation over many wallets.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Wallets processed at once.
    pub concurrency: usize,
    /// Pause after each wallet, per worker, to respect upstream rate limits.
    pub request_delay: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_delay: Duration::from_secs(1),
        }
    }
}

/// Computes wallet feature vectors from an [`ActivitySource`].
#[derive(Clone)]
pub struct FeatureAggregator {
    source: Arc<dyn ActivitySource>,
}

/// Outcome of the upstream fetches for one wallet.
struct Fetched {
    transactions: Option<Vec<WalletTransaction>>,
    positions: Option<Vec<DefiPosition>>,
    created_at: Option<DateTime<Utc>>,
    net_worth_usd: f64,
    swaps: Option<Vec<SwapEvent>>,
}

impl FeatureAggregator {
    pub fn new(source: Arc<dyn ActivitySource>) -> Self {
        Self { source }
    }

    /// Compute the full feature vector for `wallet` as of `as_of`.
    pub async fn aggregate(
        &self,
        wallet: &str,
        as_of: DateTime<Utc>,
    ) -> Result<FeatureVector, FeatureError> {
        let wallet = wallet.trim();
        if wallet.is_empty() {
            return Err(FeatureError::InvalidWallet(wallet.to_string()));
        }

        let fetched = self.fetch(wallet).await?;
        let mut v = FeatureVector::zeroed();

        if let (Some(txs), Some(created)) = (fetched.transactions.as_deref(), fetched.created_at) {
            transaction_history(&mut v, txs, created, as_of);
        }

        let positions = fetched.positions.as_deref().unwrap_or_default();
        if !positions.is_empty() {
            let summary = PositionSummary::scan(positions);
            let txs = fetched.transactions.as_deref().unwrap_or_default();
            debug!(wallet, positions = summary.position_count, apy = ?summary.average_apy, "scanned positions");

            v[C::LiquidationEventCount] = count_liquidations(txs) as f64;
            v[C::AverageHealthFactor] = summary.average_health_factor;
            v[C::CollateralUtilization] = summary.collateral_utilization();

            v[C::TotalOutstandingDebt] = summary.total_debt();
            v[C::AverageDebtSize] = summary.average_debt_size();
            v[C::DebtToAssetRatio] = summary.debt_to_asset_ratio(fetched.net_worth_usd);
            v[C::RepaymentActivity] = count_repayments(txs) as f64;
            v[C::EarningsEfficiency] = summary.earnings_efficiency();

            v[C::ProtocolDiversity] = summary.protocol_count as f64;
            v[C::LendingProtocolCount] = summary.lending_protocol_count as f64;
            v[C::LiquidityProvisionCount] = summary.liquidity_position_count as f64;
            v[C::TokenSwapCount] = fetched.swaps.as_deref().map_or(0, count_swaps) as f64;
        }

        if let Some(created) = fetched.created_at {
            v[C::WalletAgeDays] = days_between(created, as_of);
            v[C::DefiEngagementDays] = fetched
                .transactions
                .as_deref()
                .and_then(first_engagement)
                .map_or(0.0, |first| days_between(first, as_of));
        }

        Ok(v)
    }

    async fn fetch(&self, wallet: &str) -> Result<Fetched, FeatureError> {
        let mut failures: Vec<SourceError> = Vec::new();

        let transactions = degrade(wallet, self.source.transactions(wallet).await, &mut failures);
        let positions = degrade(wallet, self.source.defi_positions(wallet).await, &mut failures);
        let created_at = degrade(wallet, self.source.creation_date(wallet).await, &mut failures).flatten();

        // Net worth and swaps only feed position-gated families.
        let has_positions = positions.as_ref().is_some_and(|p| !p.is_empty());
        let (net_worth_usd, swaps) = if has_positions {
            let nw = degrade(wallet, self.source.net_worth_usd(wallet).await, &mut failures);
            let sw = degrade(wallet, self.source.swaps(wallet).await, &mut failures);
            (nw.unwrap_or(0.0), sw)
        } else {
            (0.0, None)
        };

        let attempted = if has_positions { 5 } else { 3 };
        if failures.len() == attempted {
            let reason = failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FeatureError::UpstreamDataUnavailable {
                wallet: wallet.to_string(),
                reason,
            });
        }

        Ok(Fetched {
            transactions,
            positions,
            created_at,
            net_worth_usd,
            swaps,
        })
    }
}

fn degrade<T>(wallet: &str, result: Result<T, SourceError>, failures: &mut Vec<SourceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(wallet, error = %e, "activity fetch failed, feature family degraded to defaults");
            failures.push(e);
            None
        }
    }
}

/// Frequency, volume, largest and average value. Requires at least one
/// transaction; otherwise the family stays at zero.
fn transaction_history(
    v: &mut FeatureVector,
    txs: &[WalletTransaction],
    created: DateTime<Utc>,
    as_of: DateTime<Utc>,
) {
    if txs.is_empty() {
        return;
    }
    let values: Vec<f64> = txs.iter().map(|tx| tx.value_wei as f64 / WEI_PER_ETH).collect();
    let volume: f64 = values.iter().sum();
    let largest = values.iter().copied().fold(0.0, f64::max);
    let count = txs.len() as f64;

    v[C::TransactionFrequency] = round_to(count / age_in_months(created, as_of) as f64, 2);
    v[C::TransactionVolume] = round_to(volume, 4);
    v[C::LargestTransaction] = round_to(largest, 4);
    v[C::AverageTransactionValue] = round_to(volume / count, 4);
}

/// Calendar months between `created` and `as_of`, at least 1.
fn age_in_months(created: DateTime<Utc>, as_of: DateTime<Utc>) -> i64 {
    let months = i64::from(as_of.year() - created.year()) * 12
        + (i64::from(as_of.month()) - i64::from(created.month()));
    months.max(1)
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_days().max(0) as f64
}

fn count_swaps(swaps: &[SwapEvent]) -> usize {
    swaps
        .iter()
        .filter(|s| {
            SWAP_TRANSACTION_TYPES
                .iter()
                .any(|t| t.eq_ignore_ascii_case(s.transaction_type.trim()))
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use chrono::TimeZone;
    use walletscore_core::activity::WalletActivity;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn as_of() -> DateTime<Utc> {
        at(2024, 1, 1)
    }

    fn aggregator(activity: WalletActivity) -> FeatureAggregator {
        FeatureAggregator::new(Arc::new(MemorySource::new().with(activity)))
    }

    fn lending_wallet() -> WalletActivity {
        WalletActivity {
            address: "0xlend".into(),
            transactions: Some(vec![
                WalletTransaction::new(2 * ETH, at(2023, 1, 10)).with_method("deposit"),
                WalletTransaction::new(0, at(2023, 3, 1)).with_method("borrow"),
                WalletTransaction::new(ETH, at(2023, 6, 1)).with_method("repay"),
                WalletTransaction::new(0, at(2023, 9, 1)).with_method("liquidationCall"),
            ]),
            defi_positions: Some(vec![
                DefiPosition {
                    protocol_name: Some("aave".into()),
                    balance_usd: 10_000.0,
                    is_enabled_as_collateral: true,
                    projected_yearly_earnings_usd: Some(300.0),
                    health_factor: Some(1.8),
                    ..DefiPosition::default()
                },
                DefiPosition {
                    protocol_name: Some("aave".into()),
                    balance_usd: 4_000.0,
                    is_debt: true,
                    health_factor: Some(1.8),
                    ..DefiPosition::default()
                },
            ]),
            swaps: Some(vec![
                SwapEvent { transaction_type: "buy".into() },
                SwapEvent { transaction_type: "SELL".into() },
                SwapEvent { transaction_type: "addLiquidity".into() },
            ]),
            net_worth_usd: Some(8_000.0),
            created_at: Some(at(2023, 1, 1)),
        }
    }

    #[tokio::test]
    async fn full_wallet_features() {
        let v = aggregator(lending_wallet()).aggregate("0xlend", as_of()).await.unwrap();

        // 4 txs over 12 months
        assert_eq!(v[C::TransactionFrequency], 0.33);
        assert_eq!(v[C::TransactionVolume], 3.0);
        assert_eq!(v[C::LargestTransaction], 2.0);
        assert_eq!(v[C::AverageTransactionValue], 0.75);

        assert_eq!(v[C::LiquidationEventCount], 1.0);
        assert_eq!(v[C::AverageHealthFactor], 1.8);
        assert_eq!(v[C::CollateralUtilization], 0.4);

        assert_eq!(v[C::TotalOutstandingDebt], 4_000.0);
        assert_eq!(v[C::AverageDebtSize], 2_000.0);
        assert_eq!(v[C::DebtToAssetRatio], 0.5);
        // "borrow" is a fragment of repayBorrow, so it counts alongside "repay"
        assert_eq!(v[C::RepaymentActivity], 2.0);
        assert_eq!(v[C::EarningsEfficiency], 0.03);

        assert_eq!(v[C::ProtocolDiversity], 1.0);
        assert_eq!(v[C::LendingProtocolCount], 1.0);
        assert_eq!(v[C::LiquidityProvisionCount], 0.0);
        assert_eq!(v[C::TokenSwapCount], 2.0);

        assert_eq!(v[C::WalletAgeDays], 365.0);
        assert_eq!(v[C::DefiEngagementDays], 356.0);
        assert!(v.is_finite());
    }

    #[tokio::test]
    async fn wallet_without_positions_gets_neutral_defaults() {
        let activity = WalletActivity {
            defi_positions: Some(Vec::new()),
            ..lending_wallet()
        };
        let v = aggregator(activity).aggregate("0xlend", as_of()).await.unwrap();
        assert_eq!(v[C::LiquidationEventCount], 0.0);
        assert_eq!(v[C::AverageHealthFactor], 0.0);
        assert!(v[C::AverageHealthFactor].is_finite());
        assert_eq!(v[C::CollateralUtilization], 0.0);
        assert_eq!(v[C::RepaymentActivity], 0.0);
        assert_eq!(v[C::TokenSwapCount], 0.0);
        // transaction family is unaffected
        assert_eq!(v[C::TransactionVolume], 3.0);
    }

    #[tokio::test]
    async fn unbounded_health_factor_is_infinite() {
        let mut activity = lending_wallet();
        if let Some(p) = activity.defi_positions.as_mut() {
            p[0].health_factor = Some(1e12);
        }
        let v = aggregator(activity).aggregate("0xlend", as_of()).await.unwrap();
        assert_eq!(v[C::AverageHealthFactor], f64::INFINITY);
    }

    #[tokio::test]
    async fn failed_transaction_fetch_degrades_only_dependent_families() {
        let activity = WalletActivity {
            transactions: None,
            ..lending_wallet()
        };
        let v = aggregator(activity).aggregate("0xlend", as_of()).await.unwrap();
        assert_eq!(v[C::TransactionFrequency], 0.0);
        assert_eq!(v[C::LiquidationEventCount], 0.0);
        assert_eq!(v[C::RepaymentActivity], 0.0);
        assert_eq!(v[C::DefiEngagementDays], 0.0);
        // position-derived features survive
        assert_eq!(v[C::TotalOutstandingDebt], 4_000.0);
        // creation date was supplied directly
        assert_eq!(v[C::WalletAgeDays], 365.0);
    }

    #[tokio::test]
    async fn failed_net_worth_floors_denominator() {
        let activity = WalletActivity {
            net_worth_usd: None,
            ..lending_wallet()
        };
        let v = aggregator(activity).aggregate("0xlend", as_of()).await.unwrap();
        assert_eq!(v[C::DebtToAssetRatio], 4_000.0);
    }

    #[tokio::test]
    async fn missing_creation_date_zeroes_transaction_and_tenure() {
        let activity = WalletActivity {
            transactions: Some(Vec::new()),
            created_at: None,
            ..lending_wallet()
        };
        let v = aggregator(activity).aggregate("0xlend", as_of()).await.unwrap();
        assert_eq!(v[C::TransactionFrequency], 0.0);
        assert_eq!(v[C::WalletAgeDays], 0.0);
        assert_eq!(v[C::DefiEngagementDays], 0.0);
    }

    #[tokio::test]
    async fn total_fetch_failure_is_fatal() {
        let activity = WalletActivity {
            address: "0xgone".into(),
            ..WalletActivity::default()
        };
        let err = aggregator(activity).aggregate("0xgone", as_of()).await.unwrap_err();
        assert!(matches!(err, FeatureError::UpstreamDataUnavailable { ref wallet, .. } if wallet == "0xgone"));
    }

    #[tokio::test]
    async fn unknown_wallet_is_fatal() {
        let err = aggregator(lending_wallet()).aggregate("0xother", as_of()).await.unwrap_err();
        assert!(matches!(err, FeatureError::UpstreamDataUnavailable { .. }));
    }

    #[tokio::test]
    async fn blank_wallet_is_rejected() {
        let err = aggregator(lending_wallet()).aggregate("  ", as_of()).await.unwrap_err();
        assert!(matches!(err, FeatureError::InvalidWallet(_)));
    }

    #[tokio::test]
    async fn aggregation_is_deterministic() {
        let agg = aggregator(lending_wallet());
        let a = agg.aggregate("0xlend", as_of()).await.unwrap();
        let b = agg.aggregate("0xlend", as_of()).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn months_are_at_least_one() {
        assert_eq!(age_in_months(at(2024, 1, 1), at(2024, 1, 20)), 1);
        assert_eq!(age_in_months(at(2022, 11, 30), at(2024, 1, 1)), 14);
    }

    #[test]
    fn future_creation_date_gives_zero_days() {
        assert_eq!(days_between(at(2025, 1, 1), at(2024, 1, 1)), 0.0);
    }
}
