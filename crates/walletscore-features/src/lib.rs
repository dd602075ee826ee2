//! # walletscore-features
//!
//! Per-wallet feature aggregation. [`FeatureAggregator`] turns one wallet's
//! activity, fetched through an [`ActivitySource`](walletscore_core::ActivitySource),
//! into an 18-column [`FeatureVector`](walletscore_core::FeatureVector);
//! [`FeatureCollector`] runs it over a wallet list with bounded concurrency.

pub mod aggregator;
pub mod collector;
pub mod methods;
pub mod positions;
pub mod source;

pub use aggregator::{AggregatorConfig, FeatureAggregator};
pub use collector::{CollectionReport, FeatureCollector};
pub use positions::PositionSummary;
pub use source::{JsonDirSource, MemorySource};
