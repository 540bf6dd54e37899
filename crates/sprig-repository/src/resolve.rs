//! Dependency resolution over a repository's candidates.
//!
//! Filtering runs first (dependency range, caller constraint, prerelease
//! policy), then selection. With `prefer_listed` the selection is attempted
//! on listed candidates alone before falling back to all of them. A
//! dependency without a range always takes the highest candidate; otherwise
//! the [`DependencyVersionPolicy`] decides. No match is `Ok(None)`.

use sprig_core::types::{
    ConstraintProvider, Dependency, DependencyVersionPolicy, Package,
};
use tracing::trace;

use crate::repository::PackageRepository;
use crate::RepositoryResult;

/// How a dependency is turned into a single package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub policy: DependencyVersionPolicy,
    pub allow_prerelease: bool,
    pub prefer_listed: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            policy: DependencyVersionPolicy::Lowest,
            allow_prerelease: false,
            prefer_listed: true,
        }
    }
}

impl ResolveOptions {
    pub fn with_policy(mut self, policy: DependencyVersionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = allow;
        self
    }

    pub fn with_prefer_listed(mut self, prefer: bool) -> Self {
        self.prefer_listed = prefer;
        self
    }
}

pub async fn resolve_dependency<R>(
    repository: &R,
    dependency: &Dependency,
    constraints: &dyn ConstraintProvider,
    options: &ResolveOptions,
) -> RepositoryResult<Option<Package>>
where
    R: PackageRepository + ?Sized,
{
    let candidates = repository.get_packages_by_id(&dependency.id).await?;
    let selected = resolve_from_candidates(candidates, dependency, constraints, options);
    trace!(
        source = repository.source(),
        dependency = %dependency,
        selected = ?selected.as_ref().map(|p| p.version.to_string()),
        "Resolved dependency"
    );
    Ok(selected)
}

/// Run the resolution algorithm over an already fetched candidate list
pub fn resolve_from_candidates(
    candidates: Vec<Package>,
    dependency: &Dependency,
    constraints: &dyn ConstraintProvider,
    options: &ResolveOptions,
) -> Option<Package> {
    let candidates = filter_candidates(candidates, dependency, constraints, options.allow_prerelease);

    if options.prefer_listed {
        let listed: Vec<Package> = candidates.iter().filter(|p| p.listed).cloned().collect();
        if let Some(package) = select_candidate(listed, dependency, options.policy) {
            return Some(package);
        }
    }

    select_candidate(candidates, dependency, options.policy)
}

/// Keep candidates of the dependency's id that satisfy its range, the
/// caller's constraint and the prerelease policy
pub fn filter_candidates(
    candidates: Vec<Package>,
    dependency: &Dependency,
    constraints: &dyn ConstraintProvider,
    allow_prerelease: bool,
) -> Vec<Package> {
    let constraint = constraints.constraint(&dependency.id);
    candidates
        .into_iter()
        .filter(|package| package.id == dependency.id)
        .filter(|package| dependency.accepts(&package.version))
        .filter(|package| {
            constraint
                .as_ref()
                .map_or(true, |range| range.satisfies(&package.version))
        })
        .filter(|package| allow_prerelease || !package.is_prerelease())
        .collect()
}

fn select_candidate(
    mut candidates: Vec<Package>,
    dependency: &Dependency,
    policy: DependencyVersionPolicy,
) -> Option<Package> {
    if dependency.range.is_none() {
        return candidates
            .into_iter()
            .max_by(|a, b| a.version.cmp(&b.version));
    }

    candidates.sort_by(|a, b| a.version.cmp(&b.version));
    select_dependency(candidates, policy)
}

/// Pick from candidates sorted by ascending version
pub fn select_dependency(sorted: Vec<Package>, policy: DependencyVersionPolicy) -> Option<Package> {
    let first = sorted.first()?;
    let (major, minor) = (first.version.major(), first.version.minor());

    match policy {
        DependencyVersionPolicy::Lowest => sorted.into_iter().next(),
        DependencyVersionPolicy::Highest => sorted.into_iter().last(),
        DependencyVersionPolicy::HighestPatch => sorted
            .into_iter()
            .filter(|p| p.version.major() == major && p.version.minor() == minor)
            .last(),
        DependencyVersionPolicy::HighestMinor => sorted
            .into_iter()
            .filter(|p| p.version.major() == major)
            .last(),
    }
}
