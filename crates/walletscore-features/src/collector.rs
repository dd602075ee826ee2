//! Bounded-concurrency feature collection over a wallet list.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use walletscore_core::error::FeatureError;
use walletscore_core::features::FeatureVector;
use walletscore_core::table::{FeatureRow, FeatureTable};

use crate::aggregator::{AggregatorConfig, FeatureAggregator};

/// Result of a collection run.
#[derive(Debug, Default)]
pub struct CollectionReport {
    /// One row per successfully aggregated wallet, in input order.
    pub table: FeatureTable,
    /// Wallets that could not be aggregated, in input order.
    pub skipped: Vec<(String, FeatureError)>,
}

/// Runs a [`FeatureAggregator`] over many wallets with at most
/// `concurrency` wallets in flight.
pub struct FeatureCollector {
    aggregator: FeatureAggregator,
    config: AggregatorConfig,
}

impl FeatureCollector {
    pub fn new(aggregator: FeatureAggregator, config: AggregatorConfig) -> Self {
        Self { aggregator, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Aggregate every distinct wallet in `wallets`.
    ///
    /// Duplicates (compared case-insensitively) are dropped after their
    /// first occurrence. Blank entries are ignored. Output order follows
    /// input order regardless of completion order.
    pub async fn collect(&self, wallets: &[String], as_of: DateTime<Utc>) -> CollectionReport {
        let unique = dedupe(wallets);
        info!(requested = wallets.len(), unique = unique.len(), "collecting wallet features");

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks: JoinSet<(usize, Result<FeatureVector, FeatureError>)> = JoinSet::new();

        for (index, wallet) in unique.iter().cloned().enumerate() {
            let permits = Arc::clone(&permits);
            let aggregator = self.aggregator.clone();
            let delay = self.config.request_delay;
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await;
                let result = aggregator.aggregate(&wallet, as_of).await;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<FeatureVector, FeatureError>>> =
            (0..unique.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!(error = %e, "feature task aborted"),
            }
        }

        let mut report = CollectionReport::default();
        for (wallet, result) in unique.into_iter().zip(results) {
            match result {
                Some(Ok(features)) => report.table.push(FeatureRow::new(wallet.as_str(), features)),
                Some(Err(e)) => {
                    warn!(%wallet, error = %e, "skipping wallet");
                    report.skipped.push((wallet, e));
                }
                None => {
                    let e = FeatureError::UpstreamDataUnavailable {
                        wallet: wallet.clone(),
                        reason: "aggregation task did not complete".into(),
                    };
                    report.skipped.push((wallet, e));
                }
            }
        }

        info!(collected = report.table.len(), skipped = report.skipped.len(), "collection finished");
        report
    }
}

fn dedupe(wallets: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    wallets
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .filter(|w| seen.insert(w.to_lowercase()))
        .map(str::to_string)
        .collect()
}
