use serde::Deserialize;
use std::path::Path;

use crate::error::CampaignResult;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SEGMENT_BUILDER__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub estimation: EstimationConfig,
}

// ─── Builder Config ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderConfig {
    /// Number of OR groups present when the builder opens. Never below one.
    #[serde(default = "default_initial_groups")]
    pub initial_groups: usize,
}

fn default_initial_groups() -> usize {
    1
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            initial_groups: default_initial_groups(),
        }
    }
}

// ─── Estimation Config ──────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct EstimationConfig {
    /// Delay from `start()` to each step advance, in milliseconds.
    /// The last entry completes the run.
    #[serde(default = "default_step_delays_ms")]
    pub step_delays_ms: Vec<u64>,
    #[serde(default = "default_min_audience")]
    pub min_audience: u64,
    #[serde(default = "default_max_audience")]
    pub max_audience: u64,
    /// Fixed RNG seed for reproducible mock results.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_step_delays_ms() -> Vec<u64> {
    vec![1000, 2500, 3500, 4500, 5000]
}

fn default_min_audience() -> u64 {
    50_000
}

fn default_max_audience() -> u64 {
    250_000
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            step_delays_ms: default_step_delays_ms(),
            min_audience: default_min_audience(),
            max_audience: default_max_audience(),
            seed: None,
        }
    }
}

impl EstimationConfig {
    /// Replace an empty step list or an empty audience range with the
    /// defaults.
    pub fn normalize(&mut self) {
        if self.step_delays_ms.is_empty() {
            tracing::warn!("step_delays_ms is empty, using defaults");
            self.step_delays_ms = default_step_delays_ms();
        }
        if self.min_audience >= self.max_audience {
            tracing::warn!(
                min = self.min_audience,
                max = self.max_audience,
                "audience range is empty, using defaults"
            );
            self.min_audience = default_min_audience();
            self.max_audience = default_max_audience();
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    /// Environment values take precedence over the file.
    pub fn load(path: Option<&Path>) -> CampaignResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("SEGMENT_BUILDER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(","),
            )
            .build()?;

        let mut loaded: AppConfig = config.try_deserialize()?;
        loaded.normalize();
        Ok(loaded)
    }

    /// Clamp values that would break builder invariants.
    pub fn normalize(&mut self) {
        if self.builder.initial_groups == 0 {
            tracing::warn!("initial_groups must be at least 1, using 1");
            self.builder.initial_groups = 1;
        }
        self.estimation.normalize();
    }
}
