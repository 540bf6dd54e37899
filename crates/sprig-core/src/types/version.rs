//! Package version type covering SemVer 2.0.0 and legacy four-part versions.
//!
//! A [`Version`] is immutable once parsed. Equality, ordering and hashing all
//! go through [`VersionComparer`]; the trait impls on `Version` use the
//! [`VersionComparison::Default`] mode.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

use super::comparer::{VersionComparer, VersionComparison};

/// Package version (major.minor.patch[.revision][-labels][+metadata])
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    release_labels: Vec<String>,
    metadata: Option<String>,
}

/// Version and version range parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Version string is empty")]
    Empty,

    #[error("Invalid version format: {input}")]
    InvalidFormat { input: String },

    #[error("Invalid number in version: {component}")]
    InvalidNumber { component: String },

    #[error("Invalid prerelease identifier: {prerelease}")]
    InvalidPrerelease { prerelease: String },

    #[error("Invalid build metadata: {build}")]
    InvalidBuild { build: String },

    #[error("Invalid version range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },
}

impl Version {
    /// Create a stable SemVer version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self::legacy(major, minor, patch, 0)
    }

    /// Create a four-part legacy version
    pub fn legacy(major: u64, minor: u64, patch: u64, revision: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
            release_labels: Vec::new(),
            metadata: None,
        }
    }

    /// Parse a version, accepting one to four numeric components
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        input.parse()
    }

    /// Parse a version that must have exactly major.minor.patch
    pub fn parse_strict(input: &str) -> Result<Self, VersionError> {
        let core = input
            .trim()
            .split(['-', '+'])
            .next()
            .unwrap_or_default();
        if core.split('.').count() != 3 {
            return Err(VersionError::InvalidFormat {
                input: input.trim().to_string(),
            });
        }
        input.parse()
    }

    /// Replace the release labels (empty means stable)
    pub fn with_release_labels<I, S>(mut self, labels: I) -> Result<Self, VersionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        for label in &labels {
            if !is_valid_identifier(label) {
                return Err(VersionError::InvalidPrerelease {
                    prerelease: labels.join("."),
                });
            }
        }
        self.release_labels = labels;
        Ok(self)
    }

    /// Replace the build metadata
    pub fn with_metadata(mut self, metadata: &str) -> Result<Self, VersionError> {
        self.metadata = Some(parse_metadata(metadata)?);
        Ok(self)
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Legacy fourth component, 0 when absent
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn release_labels(&self) -> &[String] {
        &self.release_labels
    }

    /// Release labels joined with '.'
    pub fn release(&self) -> String {
        self.release_labels.join(".")
    }

    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        !self.release_labels.is_empty()
    }

    /// Check if this version uses the legacy revision digit
    pub fn is_legacy(&self) -> bool {
        self.revision > 0
    }

    /// Compare against another version under the given mode
    pub fn compare_with(&self, other: &Version, mode: VersionComparison) -> Ordering {
        VersionComparer::new(mode).compare(self, other)
    }

    /// Normalized string form: the revision is omitted when zero
    pub fn to_normalized_string(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(VersionError::Empty);
        }

        // Split on '+' for build metadata
        let (version_part, metadata) = match input.split_once('+') {
            Some((v, m)) => (v, Some(parse_metadata(m)?)),
            None => (input, None),
        };

        // Split on the first '-' for prerelease labels
        let (core_part, release_labels) = match version_part.split_once('-') {
            Some((c, p)) => (c, parse_release_labels(p)?),
            None => (version_part, Vec::new()),
        };

        let parts: Vec<&str> = core_part.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(VersionError::InvalidFormat {
                input: input.to_string(),
            });
        }

        let mut numbers = [0u64; 4];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = parse_component(part)?;
        }

        Ok(Version {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            revision: numbers[3],
            release_labels,
            metadata,
        })
    }
}

fn parse_component(component: &str) -> Result<u64, VersionError> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidNumber {
            component: component.to_string(),
        });
    }
    component.parse().map_err(|_| VersionError::InvalidNumber {
        component: component.to_string(),
    })
}

fn parse_release_labels(prerelease: &str) -> Result<Vec<String>, VersionError> {
    let labels: Vec<String> = prerelease.split('.').map(str::to_string).collect();
    if labels.iter().all(|l| is_valid_identifier(l)) {
        Ok(labels)
    } else {
        Err(VersionError::InvalidPrerelease {
            prerelease: prerelease.to_string(),
        })
    }
}

fn parse_metadata(build: &str) -> Result<String, VersionError> {
    if build.split('.').all(is_valid_identifier) {
        Ok(build.to_string())
    } else {
        Err(VersionError::InvalidBuild {
            build: build.to_string(),
        })
    }
}

/// SemVer identifier: non-empty, [0-9A-Za-z-]
fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.is_empty()
        && identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;

        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }

        if self.is_prerelease() {
            write!(f, "-{}", self.release())?;
        }

        if let Some(ref metadata) = self.metadata {
            write!(f, "+{}", metadata)?;
        }

        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        VersionComparer::DEFAULT.equals(self, other)
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        VersionComparer::DEFAULT.hash_version(self, state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        VersionComparer::DEFAULT.compare(self, other)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
