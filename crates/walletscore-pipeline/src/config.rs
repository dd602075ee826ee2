//! Pipeline hyperparameters.
//!
//! [`PipelineConfig::load`] layers, from lowest to highest precedence:
//! built-in defaults, an optional TOML file, and `WALLETSCORE__*`
//! environment variables (`WALLETSCORE__BALANCE__NEIGHBORS=5`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use walletscore_core::constants::{CLUSTER_COUNT, DEFAULT_EPSILON};
use walletscore_core::error::ConfigError;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "WALLETSCORE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed for k-means initialisation.
    pub seed: u64,
    /// Number of clusters. Must equal the number of score bands.
    pub clusters: usize,
    pub kmeans_restarts: usize,
    pub max_iterations: usize,
    /// Convergence threshold on centroid movement, relative to the mean
    /// per-column variance of the scaled data.
    pub tolerance: f64,
    /// Floor applied to non-positive values before the log transform.
    pub epsilon: f64,
    pub synthetic: SyntheticConfig,
    /// Whether synthetic exemplars contribute to the per-cluster means
    /// used for risk ranking. They always take part in the cluster fit.
    pub synthetic_in_ranking: bool,
    pub balance: BalanceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            clusters: CLUSTER_COUNT,
            kmeans_restarts: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            epsilon: DEFAULT_EPSILON,
            synthetic: SyntheticConfig::default(),
            synthetic_in_ranking: true,
            balance: BalanceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub enabled: bool,
    /// Rows generated per exemplar group (three groups).
    pub group_size: usize,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group_size: 200,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub enabled: bool,
    /// Same-band neighbors considered for each interpolated row.
    pub neighbors: usize,
    pub seed: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            neighbors: 3,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Load from defaults, `path` (if given and present) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(env)
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let cfg: Self = settings
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clusters != CLUSTER_COUNT {
            return Err(ConfigError::Invalid(format!(
                "clusters must be {CLUSTER_COUNT} (one per score band), got {}",
                self.clusters
            )));
        }
        if self.kmeans_restarts == 0 {
            return Err(ConfigError::Invalid("kmeans_restarts must be at least 1".into()));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be at least 1".into()));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(ConfigError::Invalid(format!("tolerance must be >= 0, got {}", self.tolerance)));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ConfigError::Invalid(format!("epsilon must be > 0, got {}", self.epsilon)));
        }
        if self.synthetic.enabled && self.synthetic.group_size == 0 {
            return Err(ConfigError::Invalid("synthetic.group_size must be at least 1".into()));
        }
        if self.balance.enabled && self.balance.neighbors == 0 {
            return Err(ConfigError::Invalid("balance.neighbors must be at least 1".into()));
        }
        Ok(())
    }
}
