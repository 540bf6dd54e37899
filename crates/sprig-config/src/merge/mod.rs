//! Configuration layering: file, then environment overrides

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use tracing::debug;

use sprig_core::error::SprigError;
use sprig_core::types::DependencyVersionPolicy;

use crate::toml::SprigConfig;
use crate::ConfigResult;

/// Overrides `[resolution] dependency-version`
pub const ENV_DEPENDENCY_VERSION: &str = "SPRIG_DEPENDENCY_VERSION";
/// Overrides `[aggregate] source-timeout-ms`
pub const ENV_SOURCE_TIMEOUT_MS: &str = "SPRIG_SOURCE_TIMEOUT_MS";

const ENV_PREFIX: &str = "SPRIG_";

/// Where a configuration layer came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in defaults
    Default,
    /// A sprig.toml file
    File(Utf8PathBuf),
    /// An environment variable
    Environment(String),
}

/// Merges the configuration layers, lowest priority first
#[derive(Debug)]
pub struct ConfigLayering {
    config: SprigConfig,
    layers: Vec<ConfigSource>,
}

impl ConfigLayering {
    pub fn new() -> Self {
        Self {
            config: SprigConfig::default(),
            layers: vec![ConfigSource::Default],
        }
    }

    /// Replace the current settings with the file at `path`
    pub async fn with_file(mut self, path: impl AsRef<Utf8Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        self.config = SprigConfig::load(path).await?;
        self.layers.push(ConfigSource::File(path.to_path_buf()));
        Ok(self)
    }

    /// Apply overrides from the process environment
    pub fn with_process_env(self) -> ConfigResult<Self> {
        self.with_env(&Self::collect_env_overrides())
    }

    /// Apply overrides from `overrides`
    pub fn with_env(mut self, overrides: &HashMap<String, String>) -> ConfigResult<Self> {
        let applied = Self::apply_env_overrides(&mut self.config, overrides)?;
        self.layers
            .extend(applied.into_iter().map(ConfigSource::Environment));
        Ok(self)
    }

    pub fn layers(&self) -> &[ConfigSource] {
        &self.layers
    }

    pub fn build(self) -> SprigConfig {
        self.config
    }

    /// Apply environment variable overrides, returning the variables used
    pub fn apply_env_overrides(
        config: &mut SprigConfig,
        overrides: &HashMap<String, String>,
    ) -> ConfigResult<Vec<String>> {
        let mut applied = Vec::new();

        if let Some(value) = overrides.get(ENV_DEPENDENCY_VERSION) {
            config.resolution.dependency_version =
                value.parse::<DependencyVersionPolicy>().map_err(|e| match e {
                    SprigError::Config { reason, .. } => SprigError::Config {
                        field: ENV_DEPENDENCY_VERSION.to_string(),
                        reason,
                    },
                    other => other,
                })?;
            applied.push(ENV_DEPENDENCY_VERSION.to_string());
        }

        if let Some(value) = overrides.get(ENV_SOURCE_TIMEOUT_MS) {
            config.aggregate.source_timeout_ms = value.trim().parse::<u64>().map_err(|e| SprigError::Config {
                field: ENV_SOURCE_TIMEOUT_MS.to_string(),
                reason: format!("Invalid timeout '{}': {}", value, e),
            })?;
            applied.push(ENV_SOURCE_TIMEOUT_MS.to_string());
        }

        config.validate()?;
        if !applied.is_empty() {
            debug!(variables = ?applied, "Applied environment overrides");
        }
        Ok(applied)
    }

    /// Collect `SPRIG_*` environment variables
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }
}

impl Default for ConfigLayering {
    fn default() -> Self {
        Self::new()
    }
}
