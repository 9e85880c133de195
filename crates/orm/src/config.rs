//! Loader configuration

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Configuration for relationship loading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum number of keys sent in a single batched query
    pub max_batch_size: usize,
    /// Maximum number of segments in a `with_related` path
    pub max_depth: usize,
    /// Issue sibling relationship fetches of one depth level concurrently
    pub parallel_siblings: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 1000,
            max_depth: 10,
            parallel_siblings: true,
        }
    }
}

impl LoaderConfig {
    pub const MAX_BATCH_SIZE_VAR: &'static str = "ELIF_RELATIONS_MAX_BATCH_SIZE";
    pub const MAX_DEPTH_VAR: &'static str = "ELIF_RELATIONS_MAX_DEPTH";
    pub const PARALLEL_VAR: &'static str = "ELIF_RELATIONS_PARALLEL";

    /// Build a configuration from environment variables, falling back to defaults
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::MAX_BATCH_SIZE_VAR) {
            config.max_batch_size = parse_var(Self::MAX_BATCH_SIZE_VAR, &raw)?;
        }
        if let Some(raw) = lookup(Self::MAX_DEPTH_VAR) {
            config.max_depth = parse_var(Self::MAX_DEPTH_VAR, &raw)?;
        }
        if let Some(raw) = lookup(Self::PARALLEL_VAR) {
            config.parallel_siblings = parse_var(Self::PARALLEL_VAR, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration values
    pub fn validate(&self) -> ModelResult<()> {
        if self.max_batch_size == 0 {
            return Err(ModelError::Configuration(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ModelError::Configuration(
                "max_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> ModelResult<T> {
    raw.trim().parse().map_err(|_| {
        ModelError::Configuration(format!("Invalid value '{}' for {}", raw, name))
    })
}
