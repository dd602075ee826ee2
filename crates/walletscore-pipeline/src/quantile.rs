//! Converts distance-to-centroid into a score inside the cluster's band.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walletscore_core::error::{PipelineError, TableError};
use walletscore_core::table::{FeatureTable, LabeledRow, LabeledTable};

use crate::cluster::ClusterFit;
use crate::ranking::RiskRanking;

/// Labeled rows plus the clusters that were too small for rank math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringReport {
    pub labeled: LabeledTable,
    /// Clusters with fewer than two members.
    pub degenerate_clusters: Vec<usize>,
}

/// 1-based ranks with ties sharing the mean of their positions.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &i in &order[start..=end] {
            ranks[i] = rank;
        }
        start = end + 1;
    }
    ranks
}

/// Closeness quantiles for one cluster's distances: 1.0 for the nearest
/// row, 0.0 for the farthest. A single row gets 1.0.
pub fn quantiles(distances: &[f64]) -> Vec<f64> {
    let n = distances.len();
    if n <= 1 {
        return vec![1.0; n];
    }
    average_ranks(distances)
        .into_iter()
        .map(|r| 1.0 - (r - 1.0) / (n - 1) as f64)
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuantileScorer;

impl QuantileScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        table: &FeatureTable,
        fit: &ClusterFit,
        ranking: &RiskRanking,
    ) -> Result<ScoringReport, PipelineError> {
        if table.len() != fit.assignments.len() {
            return Err(TableError::RowCountMismatch {
                expected: fit.assignments.len(),
                got: table.len(),
            }
            .into());
        }

        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &cluster) in fit.assignments.iter().enumerate() {
            members.entry(cluster).or_default().push(row);
        }

        let mut quantile_of = vec![1.0; table.len()];
        let mut degenerate_clusters = Vec::new();
        for cluster in 0..fit.cluster_count() {
            let rows = members.get(&cluster).map(Vec::as_slice).unwrap_or_default();
            if rows.len() < 2 {
                warn!(cluster, members = rows.len(), "degenerate cluster, quantile defaults to 1.0");
                degenerate_clusters.push(cluster);
            }
            let distances: Vec<f64> = rows.iter().map(|&r| fit.distance_to_centroid(r)).collect();
            for (&r, q) in rows.iter().zip(quantiles(&distances)) {
                quantile_of[r] = q;
            }
        }

        let mut labeled = Vec::with_capacity(table.len());
        for (i, row) in table.rows().iter().enumerate() {
            let cluster = fit.assignments[i];
            let band = ranking.band_for(cluster)?;
            labeled.push(LabeledRow {
                wallet: row.wallet.clone(),
                features: row.features,
                cluster,
                band,
                score: band.interpolate(quantile_of[i]),
            });
        }

        let labeled = LabeledTable::new(labeled);
        info!(rows = labeled.len(), counts = ?labeled.band_counts(), "scored wallets");
        Ok(ScoringReport { labeled, degenerate_clusters })
    }
}
