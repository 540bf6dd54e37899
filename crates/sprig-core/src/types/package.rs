//! Package identifiers and the read-only package record.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::{Dependency, Version};
use crate::error::SprigError;

/// Case-insensitive package identifier
///
/// Keeps the original spelling for display; equality, ordering and hashing
/// compare the Unicode lowercase form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    /// Create an id, rejecting empty or whitespace-only names
    pub fn new(id: impl Into<String>) -> Result<Self, SprigError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(SprigError::InvalidPackageId { id });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn folded(id: &str) -> impl Iterator<Item = char> + '_ {
    id.chars().flat_map(char::to_lowercase)
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        folded(&self.0).eq(folded(&other.0))
    }
}

impl Eq for PackageId {}

impl PartialEq<str> for PackageId {
    fn eq(&self, other: &str) -> bool {
        folded(&self.0).eq(folded(other))
    }
}

impl PartialEq<&str> for PackageId {
    fn eq(&self, other: &&str) -> bool {
        folded(&self.0).eq(folded(other))
    }
}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in folded(&self.0) {
            c.hash(state);
        }
        state.write_u8(0xff);
    }
}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        folded(&self.0).cmp(folded(&other.0))
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PackageId {
    type Err = SprigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PackageId {
    type Error = SprigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PackageId {
    type Error = SprigError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}

/// The id/version key every repository, aggregate and walker dedupes on.
///
/// Two identities are the same package iff the ids match case-insensitively
/// and the versions compare equal under the default version ordering. `Eq`,
/// `Hash` and `Ord` all follow that rule, so this type is the comparer for
/// package sets and maps throughout Sprig.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: PackageId,
    pub version: Version,
}

impl PackageIdentity {
    pub fn new(id: PackageId, version: Version) -> Self {
        Self { id, version }
    }

    /// Parse an identity from an id and a version string
    pub fn parse(id: &str, version: &str) -> Result<Self, SprigError> {
        Ok(Self::new(PackageId::new(id)?, Version::parse(version)?))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Dependencies that apply to one target framework (or to all, when `None`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencySet {
    #[serde(default, rename = "targetFramework", skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl DependencySet {
    pub fn new(target_framework: Option<String>, dependencies: Vec<Dependency>) -> Self {
        Self {
            target_framework,
            dependencies,
        }
    }
}

/// Package record as supplied by a repository backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub version: Version,
    /// Unlisted packages are hidden from default queries but still fetchable by exact version
    #[serde(default = "default_listed")]
    pub listed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, rename = "dependencySets")]
    pub dependency_sets: Vec<DependencySet>,
}

fn default_listed() -> bool {
    true
}

impl Package {
    /// Create a listed package with no dependencies
    pub fn new(id: PackageId, version: Version) -> Self {
        Self {
            id,
            version,
            listed: true,
            title: None,
            description: None,
            tags: Vec::new(),
            dependency_sets: Vec::new(),
        }
    }

    /// Parse id and version and create a listed package
    pub fn parse(id: &str, version: &str) -> Result<Self, SprigError> {
        let identity = PackageIdentity::parse(id, version)?;
        Ok(Self::new(identity.id, identity.version))
    }

    pub fn unlisted(mut self) -> Self {
        self.listed = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Add a dependency to the framework-agnostic set
    pub fn with_dependency(self, dependency: Dependency) -> Self {
        self.with_framework_dependency(None, dependency)
    }

    /// Add a dependency to the set for `target_framework`
    pub fn with_framework_dependency(
        mut self,
        target_framework: Option<&str>,
        dependency: Dependency,
    ) -> Self {
        let existing = self
            .dependency_sets
            .iter_mut()
            .find(|set| set.target_framework.as_deref() == target_framework);
        match existing {
            Some(set) => set.dependencies.push(dependency),
            None => self.dependency_sets.push(DependencySet::new(
                target_framework.map(str::to_string),
                vec![dependency],
            )),
        }
        self
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }

    pub fn is_prerelease(&self) -> bool {
        self.version.is_prerelease()
    }

    /// Dependencies for a target framework
    ///
    /// A set whose framework matches case-insensitively wins; otherwise the
    /// framework-agnostic set is used. With no framework only the agnostic
    /// set applies.
    pub fn dependencies_for(&self, target_framework: Option<&str>) -> &[Dependency] {
        let matching = target_framework.and_then(|framework| {
            self.dependency_sets.iter().find(|set| {
                set.target_framework
                    .as_deref()
                    .is_some_and(|f| f.eq_ignore_ascii_case(framework))
            })
        });

        matching
            .or_else(|| {
                self.dependency_sets
                    .iter()
                    .find(|set| set.target_framework.is_none())
            })
            .map(|set| set.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Find the dependency on `id` that applies to a target framework
    pub fn find_dependency(&self, id: &PackageId, target_framework: Option<&str>) -> Option<&Dependency> {
        self.dependencies_for(target_framework)
            .iter()
            .find(|dependency| &dependency.id == id)
    }

    /// Case-insensitive match of every whitespace-separated term against
    /// id, title, description and tags; any term matching is enough
    pub fn matches_search(&self, search_term: &str) -> bool {
        let terms: Vec<String> = search_term
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        if terms.is_empty() {
            return true;
        }

        let mut haystacks = vec![self.id.as_str().to_lowercase()];
        haystacks.extend(self.title.iter().map(|t| t.to_lowercase()));
        haystacks.extend(self.description.iter().map(|d| d.to_lowercase()));
        haystacks.extend(self.tags.iter().map(|t| t.to_lowercase()));

        terms
            .iter()
            .any(|term| haystacks.iter().any(|haystack| haystack.contains(term.as_str())))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VersionRange;
    use std::collections::HashSet;

    fn id(s: &str) -> PackageId {
        PackageId::new(s).unwrap()
    }

    #[test]
    fn test_package_id_case_insensitive() {
        assert_eq!(id("Newtonsoft.Json"), id("newtonsoft.json"));
        assert_eq!(id("Foo"), "FOO");
        assert_eq!(id("Foo").to_string(), "Foo");

        let set: HashSet<_> = [id("A"), id("a"), id("b")].into_iter().collect();
        assert_eq!(set.len(), 2);

        assert!(id("alpha") < id("Beta"));
    }

    #[test]
    fn test_package_id_folds_non_ascii_case() {
        assert_eq!(id("Ärger.Core"), id("ärger.core"));
        assert_eq!(id("ΣΙΓΜΑ"), "σιγμα");
        assert_eq!(id("Émile").cmp(&id("émile")), Ordering::Equal);

        let set: HashSet<_> = [id("Öl"), id("öl"), id("ÖL")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_invalid_package_ids() {
        assert!(PackageId::new("").is_err());
        assert!(PackageId::new("   ").is_err());
        assert!(PackageId::new("two words").is_err());
        assert_eq!(PackageId::new("  trimmed ").unwrap().as_str(), "trimmed");
    }

    #[test]
    fn test_identity_equality() {
        let a = PackageIdentity::parse("jQuery", "1.0").unwrap();
        let b = PackageIdentity::parse("jquery", "1.0.0.0").unwrap();
        let c = PackageIdentity::parse("jquery", "1.0.1").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_dependencies_for_framework() {
        let agnostic = Dependency::new(id("Common"), None);
        let net45 = Dependency::new(id("Net45Only"), Some(VersionRange::parse("1.0").unwrap()));

        let package = Package::parse("App", "1.0.0")
            .unwrap()
            .with_dependency(agnostic.clone())
            .with_framework_dependency(Some("net45"), net45.clone());

        assert_eq!(package.dependencies_for(None), [agnostic.clone()]);
        assert_eq!(package.dependencies_for(Some("NET45")), [net45.clone()]);
        assert_eq!(package.dependencies_for(Some("netstandard2.0")), [agnostic]);
        assert!(package.find_dependency(&id("net45only"), Some("net45")).is_some());
        assert!(package.find_dependency(&id("net45only"), None).is_none());
    }

    #[test]
    fn test_matches_search() {
        let package = Package::parse("Sprig.Logging", "1.0.0")
            .unwrap()
            .with_description("Structured logging helpers")
            .with_tags(["tracing", "diagnostics"]);

        assert!(package.matches_search("logging"));
        assert!(package.matches_search("DIAGNOSTICS"));
        assert!(package.matches_search("unknown structured"));
        assert!(package.matches_search(""));
        assert!(!package.matches_search("database"));
    }

    #[test]
    fn test_manifest_deserialization_defaults() {
        let json = r#"{
            "id": "Sample",
            "version": "2.1.0-beta",
            "dependencySets": [
                { "dependencies": [ { "id": "Dep", "range": "[1.0,2.0)" } ] }
            ]
        }"#;

        let package: Package = serde_json::from_str(json).unwrap();
        assert!(package.listed);
        assert!(package.is_prerelease());
        assert_eq!(package.dependencies_for(None).len(), 1);

        let bad = r#"{ "id": "", "version": "1.0.0" }"#;
        assert!(serde_json::from_str::<Package>(bad).is_err());
    }
}
