use std::{fs, num::NonZeroUsize, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::{ModelConfig, adapter};
use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetConfig {
    /// A noisy linear problem split into `groups` shifted sites.
    Synthetic {
        samples: usize,
        x_size: usize,
        #[serde(default = "one")]
        groups: usize,
        #[serde(default)]
        noise: f32,
        /// Defaults to the federation's seed.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Row-major samples, `x_size` features followed by `y_size` targets per row.
    Inline {
        data: Vec<f32>,
        x_size: usize,
        y_size: usize,
        #[serde(default)]
        groups: Option<Vec<String>>,
    },
}

fn one() -> usize {
    1
}

impl DatasetConfig {
    /// Returns the `(x_size, y_size)` of the samples.
    pub fn dims(&self) -> (usize, usize) {
        match *self {
            DatasetConfig::Synthetic { x_size, .. } => (x_size, 1),
            DatasetConfig::Inline { x_size, y_size, .. } => (x_size, y_size),
        }
    }

    pub fn has_groups(&self) -> bool {
        match self {
            DatasetConfig::Synthetic { .. } => true,
            DatasetConfig::Inline { groups, .. } => groups.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionConfig {
    #[default]
    Iid,
    Grouped {
        #[serde(default)]
        groups_per_participant: Option<NonZeroUsize>,
    },
}

/// Everything needed to build and run a federation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederationConfig {
    pub participants: usize,
    pub global_rounds: NonZeroUsize,
    pub local_epochs: NonZeroUsize,
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    /// Held-out data the aggregated model is scored on after every round.
    #[serde(default)]
    pub eval_dataset: Option<DatasetConfig>,
    #[serde(default)]
    pub partition: PartitionConfig,
    #[serde(default)]
    pub round_deadline_ms: Option<u64>,
    #[serde(default)]
    pub seed: u64,
    /// Where the final global model is written, if anywhere.
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

impl FederationConfig {
    /// Parses and validates a JSON config.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the JSON is malformed or describes an impossible
    /// federation.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| OrchestratorError::InvalidConfig(format!("invalid JSON: {e}")))?;

        adapter::validate(&config)?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn round_deadline(&self) -> Option<Duration> {
        self.round_deadline_ms.map(Duration::from_millis)
    }
}
