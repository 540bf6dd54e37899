//! Version ranges in interval notation.
//!
//! | text          | meaning             |
//! |---------------|---------------------|
//! | `1.0`         | `1.0 <= v`          |
//! | `[1.0]`       | `v == 1.0`          |
//! | `(1.0,)`      | `1.0 < v`           |
//! | `(,1.0]`      | `v <= 1.0`          |
//! | `[1.0,2.0)`   | `1.0 <= v < 2.0`    |
//! | `(,)`         | any version         |
//!
//! Bounds are checked with the default version ordering.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::{Version, VersionError};

/// Lower and upper bound over [`Version`], each optional and independently inclusive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<Version>,
    min_inclusive: bool,
    max: Option<Version>,
    max_inclusive: bool,
}

impl VersionRange {
    /// Build a range, rejecting one that no version can satisfy
    pub fn new(
        min: Option<Version>,
        min_inclusive: bool,
        max: Option<Version>,
        max_inclusive: bool,
    ) -> Result<Self, VersionError> {
        if let (Some(lower), Some(upper)) = (&min, &max) {
            match lower.cmp(upper) {
                Ordering::Greater => {
                    return Err(VersionError::InvalidRange {
                        input: format_bounds(&min, min_inclusive, &max, max_inclusive),
                        reason: "lower bound is greater than upper bound".to_string(),
                    });
                }
                Ordering::Equal if !(min_inclusive && max_inclusive) => {
                    return Err(VersionError::InvalidRange {
                        input: format_bounds(&min, min_inclusive, &max, max_inclusive),
                        reason: "range excludes its only version".to_string(),
                    });
                }
                _ => {}
            }
        }

        Ok(Self {
            min_inclusive: min.is_some() && min_inclusive,
            max_inclusive: max.is_some() && max_inclusive,
            min,
            max,
        })
    }

    /// `v >= version`
    pub fn at_least(version: Version) -> Self {
        Self {
            min: Some(version),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
        }
    }

    /// `v == version`
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(version.clone()),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
        }
    }

    /// Unbounded on both sides
    pub fn all() -> Self {
        Self {
            min: None,
            min_inclusive: false,
            max: None,
            max_inclusive: false,
        }
    }

    /// Parse interval notation (see module docs)
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        input.parse()
    }

    pub fn min(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    pub fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    pub fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    /// Check whether the range pins a single version
    pub fn is_exact(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(lower), Some(upper)) => lower == upper,
            _ => false,
        }
    }

    /// Check whether `version` falls within both bounds
    pub fn satisfies(&self, version: &Version) -> bool {
        let above_min = match &self.min {
            Some(min) if self.min_inclusive => version >= min,
            Some(min) => version > min,
            None => true,
        };
        let below_max = match &self.max {
            Some(max) if self.max_inclusive => version <= max,
            Some(max) => version < max,
            None => true,
        };
        above_min && below_max
    }

    /// Human friendly rendering such as `(>= 1.0.0 && < 2.0.0)`
    pub fn to_pretty_string(&self) -> String {
        if self.is_exact() {
            if let Some(version) = &self.min {
                return format!("(= {})", version);
            }
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(min) = &self.min {
            let op = if self.min_inclusive { ">=" } else { ">" };
            parts.push(format!("{} {}", op, min));
        }
        if let Some(max) = &self.max {
            let op = if self.max_inclusive { "<=" } else { "<" };
            parts.push(format!("{} {}", op, max));
        }

        if parts.is_empty() {
            "(any)".to_string()
        } else {
            format!("({})", parts.join(" && "))
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |reason: &str| VersionError::InvalidRange {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("range is empty"));
        }

        // A bare version is a minimum inclusive bound
        if !input.starts_with(['[', '(']) {
            return Ok(Self::at_least(input.parse()?));
        }

        let min_inclusive = input.starts_with('[');
        let max_inclusive = match input.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(invalid("missing closing bracket")),
        };
        if input.len() < 2 {
            return Err(invalid("missing closing bracket"));
        }
        let inner = input[1..input.len() - 1].trim();

        let Some((lower, upper)) = inner.split_once(',') else {
            if min_inclusive && max_inclusive && !inner.is_empty() {
                return Ok(Self::exact(inner.parse()?));
            }
            return Err(invalid("an exact version must be written as [version]"));
        };

        if upper.contains(',') {
            return Err(invalid("too many bounds"));
        }

        let parse_bound = |text: &str| -> Result<Option<Version>, VersionError> {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse().map(Some)
            }
        };

        let min = parse_bound(lower)?;
        let max = parse_bound(upper)?;
        Self::new(min, min_inclusive, max, max_inclusive).map_err(|e| match e {
            VersionError::InvalidRange { reason, .. } => VersionError::InvalidRange {
                input: input.to_string(),
                reason,
            },
            other => other,
        })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            if let Some(version) = &self.min {
                return write!(f, "[{}]", version);
            }
        }
        f.write_str(&format_bounds(
            &self.min,
            self.min_inclusive,
            &self.max,
            self.max_inclusive,
        ))
    }
}

fn format_bounds(
    min: &Option<Version>,
    min_inclusive: bool,
    max: &Option<Version>,
    max_inclusive: bool,
) -> String {
    let open = if min.is_some() && min_inclusive { '[' } else { '(' };
    let close = if max.is_some() && max_inclusive { ']' } else { ')' };
    let lower = min.as_ref().map(ToString::to_string).unwrap_or_default();
    let upper = max.as_ref().map(ToString::to_string).unwrap_or_default();
    format!("{}{}, {}{}", open, lower, upper, close)
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
