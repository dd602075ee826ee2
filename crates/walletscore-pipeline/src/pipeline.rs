//! Stage-by-stage orchestration from a raw feature table to a balanced
//! labeled table.
//!
//! Stages run strictly in order and each consumes the previous stage's
//! complete output:
//!
//! sanitize → inject exemplars → cluster → rank → quantile score → balance

use std::sync::Arc;

use tracing::info;
use walletscore_core::error::{PipelineError, TableError};
use walletscore_core::table::{BalancedTable, FeatureTable};

use crate::balance::ClassBalancer;
use crate::cluster::{ClusterEngine, ClusterFit};
use crate::config::PipelineConfig;
use crate::quantile::{QuantileScorer, ScoringReport};
use crate::ranking::{RiskRanker, RiskRanking};
use crate::sanitize::DatasetSanitizer;
use crate::synthetic::SyntheticExemplarInjector;

/// Receives intermediate results, e.g. for plotting. Both hooks default
/// to doing nothing.
pub trait PipelineObserver: Send + Sync {
    fn on_clustered(&self, _fit: &ClusterFit) {}
    fn on_balanced(&self, _table: &BalancedTable) {}
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Sanitized table with synthetic exemplars appended.
    pub augmented: FeatureTable,
    pub fit: ClusterFit,
    pub ranking: RiskRanking,
    pub scoring: ScoringReport,
    /// `None` when balancing is disabled.
    pub balanced: Option<BalancedTable>,
}

/// Labeling stages over an already prepared table.
#[derive(Debug, Clone)]
pub struct Labeling {
    pub fit: ClusterFit,
    pub ranking: RiskRanking,
    pub scoring: ScoringReport,
}

pub struct ScoringPipeline {
    config: PipelineConfig,
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl ScoringPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, observers: Vec::new() })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sanitize `raw` and append synthetic exemplars when enabled.
    pub fn prepare(&self, raw: FeatureTable) -> Result<FeatureTable, PipelineError> {
        if raw.is_empty() {
            return Err(TableError::Empty.into());
        }
        let clean = DatasetSanitizer::new().sanitize(raw)?;
        if !self.config.synthetic.enabled {
            return Ok(clean);
        }
        Ok(SyntheticExemplarInjector::from_config(&self.config.synthetic).inject(clean))
    }

    /// Cluster, rank and score a prepared table.
    pub fn label(&self, table: &FeatureTable) -> Result<Labeling, PipelineError> {
        let fit = ClusterEngine::new(&self.config).fit(table)?;
        for o in &self.observers {
            o.on_clustered(&fit);
        }
        let ranking = RiskRanker::new(self.config.synthetic_in_ranking).rank(table, &fit)?;
        let scoring = QuantileScorer::new().score(table, &fit, &ranking)?;
        Ok(Labeling { fit, ranking, scoring })
    }

    pub fn run(&self, raw: FeatureTable) -> Result<PipelineOutput, PipelineError> {
        let real = raw.len();
        info!(rows = real, "pipeline started");

        let augmented = self.prepare(raw)?;
        let Labeling { fit, ranking, scoring } = self.label(&augmented)?;

        let balanced = if self.config.balance.enabled {
            let table = ClassBalancer::from_config(&self.config.balance).balance(&scoring.labeled)?;
            for o in &self.observers {
                o.on_balanced(&table);
            }
            Some(table)
        } else {
            None
        };

        info!(
            real,
            synthetic = augmented.synthetic_count(),
            degenerate = scoring.degenerate_clusters.len(),
            balanced = balanced.as_ref().map_or(0, BalancedTable::len),
            "pipeline finished"
        );
        Ok(PipelineOutput { augmented, fit, ranking, scoring, balanced })
    }
}
