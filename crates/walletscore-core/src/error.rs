//! Error types for the walletscore pipeline.
use thiserror::Error;

/// Failure of a single fetch against the external activity source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("wallet not found: {0}")] NotFound(String),
    #[error("{section} unavailable for {wallet}")] Unavailable { wallet: String, section: &'static str },
    #[error("upstream request failed: {0}")] Request(String),
    #[error("decode: {0}")] Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("no activity data could be retrieved for {wallet}: {reason}")] UpstreamDataUnavailable { wallet: String, reason: String },
    #[error("invalid wallet address: {0:?}")] InvalidWallet(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("missing column: {0}")] MissingColumn(String),
    #[error("invalid value in column {column}: {value}")] InvalidValue { column: String, value: String },
    #[error("empty table")] Empty,
    #[error("row count mismatch: expected {expected}, got {got}")] RowCountMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("column {column} has no finite value to substitute")] NoFiniteValues { column: &'static str },
    #[error("non-finite value left in column {column} for {wallet}")] InvariantViolation { wallet: String, column: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("cannot fit {clusters} clusters over {rows} rows")] TooFewRows { rows: usize, clusters: usize },
    #[error("non-finite value at row {row}, column {column}")] NonFiniteInput { row: usize, column: &'static str },
    #[error("cluster count must be positive")] ZeroClusters,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("expected {expected} clusters, got {got}")] ClusterCountMismatch { expected: usize, got: usize },
    #[error("cluster {0} has no band")] UnmappedCluster(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("insufficient minority samples in band {band}: {count} rows, {neighbors} neighbors requested")] InsufficientMinoritySamples { band: String, count: usize, neighbors: usize },
    #[error("neighbor count must be positive")] ZeroNeighbors,
    #[error(transparent)] Table(#[from] TableError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")] Invalid(String),
    #[error("config load: {0}")] Load(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)] Table(#[from] TableError),
    #[error(transparent)] Sanitize(#[from] SanitizeError),
    #[error(transparent)] Cluster(#[from] ClusterError),
    #[error(transparent)] Rank(#[from] RankError),
    #[error(transparent)] Balance(#[from] BalanceError),
    #[error(transparent)] Config(#[from] ConfigError),
}
