//! sprig.toml parsing, validation and conversion

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sprig_core::error::SprigError;
use sprig_core::types::{DependencyVersionPolicy, PackageSource};
use sprig_repository::{AggregateOptions, AggregateRepository, PackageRepository, RepositoryFactory, ResolveOptions};

use crate::ConfigResult;

/// Complete sprig.toml configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SprigConfig {
    /// How dependencies are resolved
    #[serde(default)]
    pub resolution: ResolutionSection,

    /// How multiple sources are combined
    #[serde(default)]
    pub aggregate: AggregateSection,

    /// Package sources, in priority order
    #[serde(default)]
    pub sources: Vec<SourceSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResolutionSection {
    pub dependency_version: DependencyVersionPolicy,
    pub allow_prerelease: bool,
    pub prefer_listed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
}

impl Default for ResolutionSection {
    fn default() -> Self {
        Self {
            dependency_version: DependencyVersionPolicy::Lowest,
            allow_prerelease: false,
            prefer_listed: true,
            target_framework: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AggregateSection {
    pub ignore_failing_sources: bool,
    pub resolve_vertically: bool,
    /// Per-source query timeout in milliseconds
    pub source_timeout_ms: u64,
}

impl Default for AggregateSection {
    fn default() -> Self {
        Self {
            ignore_failing_sources: true,
            resolve_vertically: false,
            source_timeout_ms: 30_000,
        }
    }
}

/// One `[[sources]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    pub name: String,
    pub source: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl From<&SourceSection> for PackageSource {
    fn from(section: &SourceSection) -> Self {
        let source = PackageSource::new(section.name.as_str(), section.source.as_str());
        if section.enabled {
            source
        } else {
            source.disabled()
        }
    }
}

impl SprigConfig {
    /// Parse and validate a sprig.toml document
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SprigConfig = ::toml::from_str(content).map_err(|e| SprigError::Config {
            field: "sprig.toml".to_string(),
            reason: format!("TOML parsing error: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load sprig.toml from `path`
    pub async fn load(path: impl AsRef<Utf8Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;

        Self::from_toml_str(&content).map_err(|e| match e {
            SprigError::Config { field, reason } => SprigError::Config {
                field,
                reason: format!("In file {}: {}", path, reason),
            },
            other => other,
        })
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        ::toml::to_string_pretty(self).map_err(|e| SprigError::Config {
            field: "sprig.toml".to_string(),
            reason: format!("TOML serialization error: {}", e),
        })
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> ConfigResult<()> {
        if self.aggregate.source_timeout_ms == 0 {
            return Err(invalid("aggregate.source-timeout-ms", "must be greater than zero"));
        }

        if let Some(framework) = &self.resolution.target_framework {
            if framework.trim().is_empty() {
                return Err(invalid("resolution.target-framework", "must not be empty"));
            }
        }

        let mut names = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                return Err(invalid(format!("sources[{}].name", index), "must not be empty"));
            }
            if source.source.trim().is_empty() {
                return Err(invalid(
                    format!("sources[{}].source", index),
                    format!("source '{}' has no location", source.name),
                ));
            }
            if !names.insert(source.name.to_ascii_lowercase()) {
                return Err(invalid(
                    format!("sources[{}].name", index),
                    format!("duplicate source name '{}'", source.name),
                ));
            }
        }

        Ok(())
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default()
            .with_policy(self.resolution.dependency_version)
            .with_prerelease(self.resolution.allow_prerelease)
            .with_prefer_listed(self.resolution.prefer_listed)
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions::default()
            .with_ignore_failing_sources(self.aggregate.ignore_failing_sources)
            .with_resolve_vertically(self.aggregate.resolve_vertically)
            .with_source_timeout(Duration::from_millis(self.aggregate.source_timeout_ms))
    }

    /// Every configured source, disabled ones included
    pub fn package_sources(&self) -> Vec<PackageSource> {
        self.sources.iter().map(PackageSource::from).collect()
    }

    pub fn target_framework(&self) -> Option<&str> {
        self.resolution.target_framework.as_deref()
    }

    /// Build the repository the configured sources describe
    ///
    /// A single enabled source is used directly; several are aggregated.
    pub fn create_repository(&self, factory: &dyn RepositoryFactory) -> ConfigResult<Arc<dyn PackageRepository>> {
        if !self.sources.iter().any(|source| source.enabled) {
            return Err(invalid("sources", "no enabled package source"));
        }
        AggregateRepository::create(factory, &self.package_sources(), self.aggregate_options())
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> SprigError {
    SprigError::Config {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_repository::DefaultRepositoryFactory;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SprigConfig::from_toml_str("").unwrap();
        assert_eq!(config, SprigConfig::default());
        assert_eq!(config.resolve_options(), ResolveOptions::default());
        assert_eq!(config.aggregate_options(), AggregateOptions::default());
        assert!(config.package_sources().is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[resolution]
dependency-version = "highest-minor"
allow-prerelease = true
prefer-listed = false
target-framework = "net45"

[aggregate]
ignore-failing-sources = false
resolve-vertically = true
source-timeout-ms = 2500

[[sources]]
name = "local"
source = "/var/packages"

[[sources]]
name = "archive"
source = "/srv/archive"
enabled = false
"#;

        let config = SprigConfig::from_toml_str(toml).unwrap();

        let resolve = config.resolve_options();
        assert_eq!(resolve.policy, DependencyVersionPolicy::HighestMinor);
        assert!(resolve.allow_prerelease);
        assert!(!resolve.prefer_listed);
        assert_eq!(config.target_framework(), Some("net45"));

        let aggregate = config.aggregate_options();
        assert!(!aggregate.ignore_failing_sources);
        assert!(aggregate.resolve_vertically);
        assert_eq!(aggregate.source_timeout, Duration::from_millis(2500));

        let sources = config.package_sources();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].enabled);
        assert!(!sources[1].enabled);
        assert_eq!(sources[1].source, "/srv/archive");
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let cases = [
            "[resolution]\ndependency-version = \"newest\"",
            "[aggregate]\nsource-timeout-ms = 0",
            "[resolution]\ntarget-framework = \" \"",
            "[[sources]]\nname = \"\"\nsource = \"/a\"",
            "[[sources]]\nname = \"a\"\nsource = \"\"",
            "[[sources]]\nname = \"a\"\nsource = \"/a\"\n[[sources]]\nname = \"A\"\nsource = \"/b\"",
            "[resolution]\nunknown-key = 1",
        ];

        for case in cases {
            let err = SprigConfig::from_toml_str(case).unwrap_err();
            assert!(matches!(err, SprigError::Config { .. }), "{}", case);
        }
    }

    #[test]
    fn test_round_trip_serialization() {
        let toml = r#"
[resolution]
dependency-version = "highest-patch"

[[sources]]
name = "local"
source = "/var/packages"
"#;
        let config = SprigConfig::from_toml_str(toml).unwrap();
        let serialized = config.to_toml_string().unwrap();
        assert_eq!(SprigConfig::from_toml_str(&serialized).unwrap(), config);
    }

    #[test]
    fn test_create_repository() {
        let single = SprigConfig::from_toml_str(
            "[[sources]]\nname = \"local\"\nsource = \"/var/packages\"",
        )
        .unwrap();
        let repository = single.create_repository(&DefaultRepositoryFactory).unwrap();
        assert_eq!(repository.source(), "/var/packages");

        let none = SprigConfig::from_toml_str(
            "[[sources]]\nname = \"local\"\nsource = \"/var/packages\"\nenabled = false",
        )
        .unwrap();
        assert!(matches!(
            none.create_repository(&DefaultRepositoryFactory),
            Err(SprigError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = camino::Utf8PathBuf::try_from(temp_dir.path().join("sprig.toml")).unwrap();
        tokio::fs::write(&path, "[aggregate]\nresolve-vertically = true\n")
            .await
            .unwrap();

        let config = SprigConfig::load(&path).await.unwrap();
        assert!(config.aggregate.resolve_vertically);

        let missing = SprigConfig::load(path.with_file_name("missing.toml")).await;
        assert!(matches!(missing, Err(SprigError::Io { .. })));
    }

    #[tokio::test]
    async fn test_load_reports_file_in_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = camino::Utf8PathBuf::try_from(temp_dir.path().join("sprig.toml")).unwrap();
        tokio::fs::write(&path, "[aggregate]\nsource-timeout-ms = 0\n")
            .await
            .unwrap();

        let err = SprigConfig::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("sprig.toml"));
    }
}
