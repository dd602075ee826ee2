//! Orders clusters from least to most risky and gives each a band.
//!
//! Per cluster, the means of four key metrics are min-max normalised
//! across clusters (a constant metric normalises to 0). Liquidation
//! count, debt and debt-to-asset are inverted so that higher is better
//! for all four, and their sum is the cluster's risk score. Clusters are
//! sorted by descending score, ties by ascending cluster id, and the
//! i-th cluster receives the i-th band.
//!
//! A cluster with no contributing rows has no means. It is ranked after
//! every populated cluster and logged as degenerate.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walletscore_core::band::ScoreBand;
use walletscore_core::error::RankError;
use walletscore_core::features::FeatureColumn;
use walletscore_core::table::FeatureTable;

use crate::cluster::ClusterFit;

/// One cluster's summary and band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRisk {
    pub cluster: usize,
    pub band: ScoreBand,
    /// Rows that contributed to the means.
    pub members: usize,
    pub mean_health_factor: f64,
    pub mean_liquidations: f64,
    pub mean_debt: f64,
    pub mean_debt_to_asset: f64,
    /// Sum of the four normalised metrics, in `[0, 4]`.
    pub risk_score: f64,
}

/// Clusters in best-to-worst order, one per band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRanking {
    clusters: Vec<ClusterRisk>,
}

impl RiskRanking {
    /// Best-to-worst cluster summaries.
    pub fn clusters(&self) -> &[ClusterRisk] {
        &self.clusters
    }

    pub fn band_for(&self, cluster: usize) -> Result<ScoreBand, RankError> {
        self.clusters
            .iter()
            .find(|c| c.cluster == cluster)
            .map(|c| c.band)
            .ok_or(RankError::UnmappedCluster(cluster))
    }

    /// `(cluster, band)` pairs, best band first.
    pub fn mapping(&self) -> Vec<(usize, ScoreBand)> {
        self.clusters.iter().map(|c| (c.cluster, c.band)).collect()
    }

    /// Clusters that had no contributing rows.
    pub fn empty_clusters(&self) -> Vec<usize> {
        self.clusters
            .iter()
            .filter(|c| c.members == 0)
            .map(|c| c.cluster)
            .collect()
    }
}

const KEY_METRICS: [FeatureColumn; 4] = [
    FeatureColumn::AverageHealthFactor,
    FeatureColumn::LiquidationEventCount,
    FeatureColumn::TotalOutstandingDebt,
    FeatureColumn::DebtToAssetRatio,
];

#[derive(Debug, Clone)]
pub struct RiskRanker {
    include_synthetic: bool,
}

impl RiskRanker {
    /// `include_synthetic` controls whether synthetic exemplars count
    /// toward the per-cluster means.
    pub fn new(include_synthetic: bool) -> Self {
        Self { include_synthetic }
    }

    pub fn rank(&self, table: &FeatureTable, fit: &ClusterFit) -> Result<RiskRanking, RankError> {
        let k = fit.cluster_count();
        if k != ScoreBand::ALL.len() {
            return Err(RankError::ClusterCountMismatch { expected: ScoreBand::ALL.len(), got: k });
        }

        let mut sums = vec![[0.0; 4]; k];
        let mut members = vec![0usize; k];
        for (row, &cluster) in table.rows().iter().zip(&fit.assignments) {
            if cluster >= k {
                return Err(RankError::UnmappedCluster(cluster));
            }
            if row.is_synthetic() && !self.include_synthetic {
                continue;
            }
            members[cluster] += 1;
            for (s, metric) in sums[cluster].iter_mut().zip(KEY_METRICS) {
                *s += row.features[metric];
            }
        }

        let means: Vec<Option<[f64; 4]>> = sums
            .iter()
            .zip(&members)
            .map(|(s, &n)| (n > 0).then(|| s.map(|x| x / n as f64)))
            .collect();

        let scores = composite_scores(&means);
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| match (scores[a], scores[b]) {
            (Some(x), Some(y)) => y.total_cmp(&x).then(a.cmp(&b)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(&b),
        });

        let clusters: Vec<ClusterRisk> = order
            .into_iter()
            .zip(ScoreBand::ALL)
            .map(|(cluster, band)| {
                let m = means[cluster].unwrap_or([0.0; 4]);
                if members[cluster] == 0 {
                    warn!(cluster, %band, "cluster has no ranking members, ranked last");
                }
                ClusterRisk {
                    cluster,
                    band,
                    members: members[cluster],
                    mean_health_factor: m[0],
                    mean_liquidations: m[1],
                    mean_debt: m[2],
                    mean_debt_to_asset: m[3],
                    risk_score: scores[cluster].unwrap_or(0.0),
                }
            })
            .collect();

        for c in &clusters {
            info!(cluster = c.cluster, band = %c.band, risk_score = c.risk_score, members = c.members, "ranked cluster");
        }
        Ok(RiskRanking { clusters })
    }
}

/// Sum of min-max normalised metrics with the detrimental three inverted.
fn composite_scores(means: &[Option<[f64; 4]>]) -> Vec<Option<f64>> {
    let mut lo = [f64::INFINITY; 4];
    let mut hi = [f64::NEG_INFINITY; 4];
    for m in means.iter().flatten() {
        for j in 0..4 {
            lo[j] = lo[j].min(m[j]);
            hi[j] = hi[j].max(m[j]);
        }
    }
    means
        .iter()
        .map(|m| {
            m.map(|m| {
                (0..4)
                    .map(|j| {
                        let range = hi[j] - lo[j];
                        let norm = if range > 0.0 { (m[j] - lo[j]) / range } else { 0.0 };
                        if j == 0 { norm } else { 1.0 - norm }
                    })
                    .sum()
            })
        })
        .collect()
}
