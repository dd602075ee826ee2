//! End-to-end scenarios over realistic wallet archetypes.

use std::sync::Arc;

use walletscore_core::band::ScoreBand;
use walletscore_core::error::{BalanceError, FeatureError};
use walletscore_core::features::{FeatureColumn as C, FeatureVector};
use walletscore_core::table::{FeatureRow, FeatureTable, LabeledRow, LabeledTable, WalletId};
use walletscore_features::{FeatureAggregator, MemorySource};
use walletscore_pipeline::{
    BalanceConfig, ClassBalancer, PipelineConfig, ScoringPipeline, SyntheticConfig,
};
use walletscore_tests::helpers::{self, ARCHETYPES, RISKY, SAFE};

fn config(synthetic: bool) -> PipelineConfig {
    PipelineConfig {
        kmeans_restarts: 5,
        synthetic: SyntheticConfig { enabled: synthetic, group_size: 20, ..SyntheticConfig::default() },
        balance: BalanceConfig { enabled: false, ..BalanceConfig::default() },
        ..PipelineConfig::default()
    }
}

fn label_of(labeled: &LabeledTable, wallet: &str) -> LabeledRow {
    let id = WalletId::new(wallet);
    labeled
        .rows()
        .iter()
        .find(|r| r.wallet == id)
        .cloned()
        .unwrap_or_else(|| panic!("{wallet} missing from output"))
}

// ---------------------------------------------------------------------------
// Risk ordering
// ---------------------------------------------------------------------------

#[test]
fn risky_wallet_lands_in_worse_band_than_safe_wallet() {
    let mut raw = helpers::population(12);
    raw.push(FeatureRow::new("0xsafe", helpers::vector(SAFE, 3)));
    raw.push(FeatureRow::new("0xrisky", helpers::vector(RISKY, 3)));

    let out = ScoringPipeline::new(config(true)).unwrap().run(raw).unwrap();
    let safe = label_of(&out.scoring.labeled, "0xsafe");
    let risky = label_of(&out.scoring.labeled, "0xrisky");

    assert!(risky.band.rank() > safe.band.rank(), "{:?} vs {:?}", risky.band, safe.band);
    assert!(risky.score < safe.score);
}

#[test]
fn distinct_archetypes_map_to_distinct_bands() {
    let out = ScoringPipeline::new(config(false))
        .unwrap()
        .run(helpers::population(12))
        .unwrap();
    let labeled = &out.scoring.labeled;

    // Archetypes are listed best to worst apart from the first two,
    // where the debt-free wallet outranks the modest borrower.
    let expected = [
        ScoreBand::VeryGood,
        ScoreBand::Exceptional,
        ScoreBand::Good,
        ScoreBand::Fair,
        ScoreBand::Poor,
    ];
    for (a, band) in expected.iter().enumerate() {
        for n in 0..12 {
            let row = label_of(labeled, &format!("0x{a}{n:03}"));
            assert_eq!(row.band, *band, "archetype {a} wallet {n}");
            assert!(band.contains(row.score));
        }
    }
    assert_eq!(labeled.band_counts(), [12; 5]);
}

// ---------------------------------------------------------------------------
// Wallets without positions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wallet_without_positions_is_not_mistaken_for_unbounded_health() {
    let source = MemorySource::new()
        .with(helpers::idle_activity("0xidle"))
        .with(helpers::lending_activity("0xunbounded", Some(1e12)));
    let aggregator = FeatureAggregator::new(Arc::new(source));

    let idle = aggregator.aggregate("0xidle", helpers::as_of()).await.unwrap();
    assert_eq!(idle[C::LiquidityProvisionCount], 0.0);
    assert_eq!(idle[C::AverageHealthFactor], 0.0);
    assert_eq!(idle[C::CollateralUtilization], 0.0);
    assert_eq!(idle[C::TotalOutstandingDebt], 0.0);
    assert!(idle.is_finite());

    let unbounded = aggregator.aggregate("0xunbounded", helpers::as_of()).await.unwrap();
    assert_eq!(unbounded[C::AverageHealthFactor], f64::INFINITY);
    assert_eq!(unbounded[C::CollateralUtilization], 0.25);
}

#[tokio::test]
async fn wallet_with_every_fetch_failing_is_reported() {
    let source = helpers::FlakySource::new(
        MemorySource::new().with(helpers::lending_activity("0xdown", Some(1.5))),
        &["transactions", "positions", "creation_date"],
    );
    let aggregator = FeatureAggregator::new(Arc::new(source));
    let err = aggregator.aggregate("0xdown", helpers::as_of()).await.unwrap_err();
    match err {
        FeatureError::UpstreamDataUnavailable { wallet, reason } => {
            assert_eq!(wallet, "0xdown");
            assert!(reason.contains("transactions timed out"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn partial_outage_keeps_surviving_families() {
    let source = helpers::FlakySource::new(
        MemorySource::new().with(helpers::lending_activity("0xpartial", Some(1.5))),
        &["net_worth", "swaps"],
    );
    let aggregator = FeatureAggregator::new(Arc::new(source));
    let v = aggregator.aggregate("0xpartial", helpers::as_of()).await.unwrap();
    assert_eq!(v[C::TokenSwapCount], 0.0);
    assert_eq!(v[C::AverageHealthFactor], 1.5);
    assert_eq!(v[C::TotalOutstandingDebt], 5_000.0);
    // no net worth: ratio falls back to the raw debt
    assert_eq!(v[C::DebtToAssetRatio], 5_000.0);
}

// ---------------------------------------------------------------------------
// Balancing
// ---------------------------------------------------------------------------

fn labeled_with_counts(counts: [usize; 5]) -> LabeledTable {
    let mut rows = Vec::new();
    for (band, &count) in ScoreBand::ALL.iter().zip(&counts) {
        for i in 0..count {
            rows.push(LabeledRow {
                wallet: WalletId::new(format!("0x{}{i:02}", band.rank())),
                features: FeatureVector::zeroed()
                    .with(C::AverageHealthFactor, 3.0 - band.rank() as f64 * 0.5 + i as f64 * 0.01)
                    .with(C::TransactionFrequency, i as f64),
                cluster: band.rank(),
                band: *band,
                score: band.interpolate(i as f64 / count as f64),
            });
        }
    }
    LabeledTable::new(rows)
}

#[test]
fn balancer_rejects_band_smaller_than_neighbor_count() {
    let labeled = labeled_with_counts([10, 10, 10, 10, 2]);
    let err = ClassBalancer::new(3, 42).balance(&labeled).unwrap_err();
    assert_eq!(
        err,
        BalanceError::InsufficientMinoritySamples {
            band: ScoreBand::Poor.label().to_string(),
            count: 2,
            neighbors: 3,
        }
    );
}

#[test]
fn balancer_equalizes_bands_and_keeps_scores_in_range() {
    let labeled = labeled_with_counts([10, 8, 6, 5, 4]);
    let balanced = ClassBalancer::new(3, 42).balance(&labeled).unwrap();
    assert_eq!(balanced.band_counts(), [10; 5]);
    assert_eq!(balanced.synthesized_count(), 50 - 33);
    for row in balanced.rows() {
        assert!(row.band.contains(row.score));
        assert!(row.features.is_finite());
    }
}

// ---------------------------------------------------------------------------
// Degenerate clusters
// ---------------------------------------------------------------------------

#[test]
fn lone_outlier_gets_band_maximum() {
    // Four tight archetypes plus one wallet unlike any of them.
    let mut rows: Vec<FeatureRow> = Vec::new();
    for (a, profile) in ARCHETYPES[..4].iter().enumerate() {
        for n in 0..10 {
            rows.push(FeatureRow::new(format!("0x{a}{n:03}").as_str(), helpers::vector(*profile, n)));
        }
    }
    rows.push(FeatureRow::new("0xoutlier", helpers::vector(RISKY, 0)));
    let raw: FeatureTable = rows.into_iter().collect();

    let out = ScoringPipeline::new(config(false)).unwrap().run(raw).unwrap();
    let outlier = label_of(&out.scoring.labeled, "0xoutlier");

    assert_eq!(out.fit.sizes()[outlier.cluster], 1);
    assert!(out.scoring.degenerate_clusters.contains(&outlier.cluster));
    assert_eq!(outlier.band, ScoreBand::Poor);
    assert_eq!(outlier.score, ScoreBand::Poor.max());
}
