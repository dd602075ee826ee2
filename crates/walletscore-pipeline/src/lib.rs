//! # walletscore-pipeline
//!
//! Turns a raw wallet feature table into calibrated credit scores without
//! labeled ground truth:
//! - **Sanitize**: infinities, neutral health factors and missing values
//! - **Anchor**: synthetic exemplars encoding known risk relationships
//! - **Cluster**: k-means over log-transformed, min-max scaled features
//! - **Rank**: clusters ordered by a composite risk score, one band each
//! - **Score**: distance-to-centroid quantiles interpolated inside the band
//! - **Balance**: nearest-neighbor interpolation until bands are even
//!
//! [`ScoringPipeline::run`] executes all stages in order.

pub mod balance;
pub mod cluster;
pub mod config;
pub mod crosscheck;
pub mod pipeline;
pub mod quantile;
pub mod ranking;
pub mod sanitize;
pub mod scaling;
pub mod synthetic;

pub use balance::ClassBalancer;
pub use cluster::{ClusterEngine, ClusterFit};
pub use config::{BalanceConfig, PipelineConfig, SyntheticConfig};
pub use crosscheck::{cross_check, heuristic_band, heuristic_score, CrossCheckReport};
pub use pipeline::{Labeling, PipelineObserver, PipelineOutput, ScoringPipeline};
pub use quantile::{QuantileScorer, ScoringReport};
pub use ranking::{ClusterRisk, RiskRanker, RiskRanking};
pub use sanitize::DatasetSanitizer;
pub use synthetic::SyntheticExemplarInjector;
