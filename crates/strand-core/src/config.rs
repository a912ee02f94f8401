//! Configuration for embedded graphs.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`STRAND__GRAPH__` prefix)
//! 2. Config file (`<prefix>.toml`, `[graph]` section)
//! 3. Defaults

use serde::Deserialize;

use crate::error::Result;
use crate::ids::{IdGenerator, SequentialGenerator, UuidGenerator};

/// Graph construction settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GraphConfig {
    /// How fresh node IDs are produced.
    #[serde(default)]
    pub id_strategy: IdStrategy,

    /// Prefix for sequential IDs. Ignored for UUIDs.
    #[serde(default)]
    pub id_prefix: String,

    /// Repeated taken IDs tolerated in a row before giving up on a generator.
    #[serde(default = "default_max_id_attempts")]
    pub max_id_attempts: u32,
}

/// Built-in ID generators.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Random UUID v4.
    #[default]
    Uuid,
    /// Monotonic counter with `id_prefix`.
    Sequential,
}

fn default_max_id_attempts() -> u32 {
    16
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            id_strategy: IdStrategy::default(),
            id_prefix: String::new(),
            max_id_attempts: default_max_id_attempts(),
        }
    }
}

impl GraphConfig {
    /// Load from `<file_prefix>.toml` (optional) and `STRAND__GRAPH__*` variables.
    ///
    /// A missing `[graph]` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("STRAND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<GraphConfig>("graph") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => {
                tracing::debug!(file_prefix, "No [graph] config section, using defaults");
                Ok(GraphConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Build the configured ID generator.
    pub fn id_generator(&self) -> Box<dyn IdGenerator> {
        match self.id_strategy {
            IdStrategy::Uuid => Box::new(UuidGenerator),
            IdStrategy::Sequential => Box::new(SequentialGenerator::new(self.id_prefix.clone())),
        }
    }
}
