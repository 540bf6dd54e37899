//! Mode-aware version comparison.
//!
//! Every ordering, equality and hash of a [`Version`] in Sprig is defined by a
//! [`VersionComparer`]. Comparison proceeds field by field and stops at the
//! first difference:
//!
//! 1. major, minor, patch (numeric)
//! 2. legacy revision, skipped in [`VersionComparison::Strict`]
//! 3. release labels, skipped in [`VersionComparison::Version`]; prerelease
//!    sorts before stable, labels compare pairwise and a shorter prefix sorts
//!    first
//! 4. build metadata, only in [`VersionComparison::Default`] (case-insensitive,
//!    absent before present)
//!
//! Hashing covers exactly the components compared, folded to upper case where
//! the comparison is case-insensitive, so `compare == Equal` implies equal
//! hashes for the same mode.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use super::Version;

/// Which version components participate in a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionComparison {
    /// Full ordering including metadata as a final tiebreaker
    #[default]
    Default,
    /// SemVer 2.0.0 precedence: no revision, case-sensitive labels, no metadata
    Strict,
    /// Numeric components only (major.minor.patch.revision)
    Version,
    /// Everything except build metadata
    IgnoreMetadata,
}

/// Compares, equates and hashes versions under one [`VersionComparison`] mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionComparer {
    mode: VersionComparison,
}

impl VersionComparer {
    pub const DEFAULT: Self = Self::new(VersionComparison::Default);
    pub const STRICT: Self = Self::new(VersionComparison::Strict);
    pub const VERSION: Self = Self::new(VersionComparison::Version);
    pub const IGNORE_METADATA: Self = Self::new(VersionComparison::IgnoreMetadata);

    pub const fn new(mode: VersionComparison) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> VersionComparison {
        self.mode
    }

    /// Compare two versions under this comparer's mode
    pub fn compare(&self, x: &Version, y: &Version) -> Ordering {
        let result = x
            .major()
            .cmp(&y.major())
            .then_with(|| x.minor().cmp(&y.minor()))
            .then_with(|| x.patch().cmp(&y.patch()));
        if result != Ordering::Equal {
            return result;
        }

        if self.mode != VersionComparison::Strict {
            let result = x.revision().cmp(&y.revision());
            if result != Ordering::Equal {
                return result;
            }
        }

        if self.mode == VersionComparison::Version {
            return Ordering::Equal;
        }

        let result = match (x.is_prerelease(), y.is_prerelease()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => self.compare_release_labels(x.release_labels(), y.release_labels()),
            (false, false) => Ordering::Equal,
        };
        if result != Ordering::Equal {
            return result;
        }

        if self.mode == VersionComparison::Default {
            return cmp_ignore_case(x.metadata().unwrap_or(""), y.metadata().unwrap_or(""));
        }

        Ordering::Equal
    }

    /// Versions are equal iff they compare equal under this mode
    pub fn equals(&self, x: &Version, y: &Version) -> bool {
        self.compare(x, y) == Ordering::Equal
    }

    /// Feed the components this mode compares into `state`
    pub fn hash_version<H: Hasher>(&self, version: &Version, state: &mut H) {
        version.major().hash(state);
        version.minor().hash(state);
        version.patch().hash(state);

        if self.mode != VersionComparison::Strict {
            version.revision().hash(state);
        }

        if self.mode == VersionComparison::Version {
            return;
        }

        let labels = version.release_labels();
        labels.len().hash(state);
        for label in labels {
            match numeric_label(label) {
                Some(digits) => {
                    state.write_u8(0);
                    digits.hash(state);
                }
                None => {
                    state.write_u8(1);
                    self.hash_text(label, state);
                }
            }
        }

        if self.mode == VersionComparison::Default {
            hash_ignore_case(version.metadata().unwrap_or(""), state);
        }
    }

    /// Wrap a version so std collections use this comparer's equality and hash
    pub fn key<'a>(&self, version: &'a Version) -> ComparedVersion<'a> {
        ComparedVersion {
            comparer: *self,
            version,
        }
    }

    fn compare_release_labels(&self, x: &[String], y: &[String]) -> Ordering {
        for pair in x.iter().zip(y) {
            let result = self.compare_label(pair.0, pair.1);
            if result != Ordering::Equal {
                return result;
            }
        }
        // A label list that is a prefix of the other sorts first
        x.len().cmp(&y.len())
    }

    fn compare_label(&self, x: &str, y: &str) -> Ordering {
        match (numeric_label(x), numeric_label(y)) {
            (Some(a), Some(b)) => cmp_numeric(a, b),
            // Numeric identifiers have lower precedence than alphanumeric ones
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) if self.mode == VersionComparison::Strict => x.cmp(y),
            (None, None) => cmp_ignore_case(x, y),
        }
    }

    fn hash_text<H: Hasher>(&self, text: &str, state: &mut H) {
        if self.mode == VersionComparison::Strict {
            text.hash(state);
        } else {
            hash_ignore_case(text, state);
        }
    }
}

/// A version paired with the comparer that defines its equality and hash
#[derive(Debug, Clone, Copy)]
pub struct ComparedVersion<'a> {
    comparer: VersionComparer,
    version: &'a Version,
}

impl ComparedVersion<'_> {
    pub fn version(&self) -> &Version {
        self.version
    }
}

impl PartialEq for ComparedVersion<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.comparer.equals(self.version, other.version)
    }
}

impl Eq for ComparedVersion<'_> {}

impl Hash for ComparedVersion<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.comparer.hash_version(self.version, state);
    }
}

impl PartialOrd for ComparedVersion<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComparedVersion<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparer.compare(self.version, other.version)
    }
}

/// Digits of an all-numeric label with leading zeros stripped
fn numeric_label(label: &str) -> Option<&str> {
    if !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()) {
        Some(label.trim_start_matches('0'))
    } else {
        None
    }
}

/// Numeric order of arbitrarily long digit strings without leading zeros
fn cmp_numeric(x: &str, y: &str) -> Ordering {
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

fn cmp_ignore_case(x: &str, y: &str) -> Ordering {
    x.bytes()
        .map(|b| b.to_ascii_uppercase())
        .cmp(y.bytes().map(|b| b.to_ascii_uppercase()))
}

fn hash_ignore_case<H: Hasher>(text: &str, state: &mut H) {
    for byte in text.bytes() {
        state.write_u8(byte.to_ascii_uppercase());
    }
    state.write_u8(0xff);
}
