//! Dependency specifications and the policy used to pick among candidates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{PackageId, VersionRange};
use crate::error::SprigError;

/// A request for some version of a package
///
/// A missing range means any version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub id: PackageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<VersionRange>,
}

impl Dependency {
    pub fn new(id: PackageId, range: Option<VersionRange>) -> Self {
        Self { id, range }
    }

    /// Parse an id and an optional range string
    pub fn parse(id: &str, range: Option<&str>) -> Result<Self, SprigError> {
        let range = range.map(VersionRange::parse).transpose()?;
        Ok(Self::new(PackageId::new(id)?, range))
    }

    /// Check whether the version range accepts `version` (no range accepts all)
    pub fn accepts(&self, version: &super::Version) -> bool {
        self.range
            .as_ref()
            .map_or(true, |range| range.satisfies(version))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{} {}", self.id, range.to_pretty_string()),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Which of the acceptable versions a dependency should resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyVersionPolicy {
    /// Smallest acceptable version
    #[default]
    Lowest,
    /// Largest acceptable version
    Highest,
    /// Lowest major.minor, then the highest patch within it
    HighestPatch,
    /// Lowest major, then the highest minor and patch within it
    HighestMinor,
}

impl FromStr for DependencyVersionPolicy {
    type Err = SprigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowest" => Ok(Self::Lowest),
            "highest" => Ok(Self::Highest),
            "highest-patch" | "highestpatch" => Ok(Self::HighestPatch),
            "highest-minor" | "highestminor" => Ok(Self::HighestMinor),
            other => Err(SprigError::Config {
                field: "dependency-version".to_string(),
                reason: format!(
                    "unknown policy '{}', expected lowest, highest, highest-patch or highest-minor",
                    other
                ),
            }),
        }
    }
}

impl fmt::Display for DependencyVersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lowest => "lowest",
            Self::Highest => "highest",
            Self::HighestPatch => "highest-patch",
            Self::HighestMinor => "highest-minor",
        };
        f.write_str(name)
    }
}
