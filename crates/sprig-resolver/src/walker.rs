//! Depth-first expansion of a package's dependency graph.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use sprig_core::types::{
    ConstraintProvider, Dependency, DependencyVersionPolicy, NullConstraintProvider, Package,
    PackageIdentity,
};
use sprig_core::SprigError;
use sprig_repository::{PackageRepository, ResolveOptions};

use crate::marker::PackageMarker;
use crate::ResolverResult;

/// How dependencies are chosen during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    pub policy: DependencyVersionPolicy,
    pub allow_prerelease: bool,
    pub prefer_listed: bool,
    /// Picks the dependency set; `None` uses the framework-neutral set
    pub target_framework: Option<String>,
    /// Log and skip dependencies nothing satisfies instead of failing
    pub skip_missing: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            policy: DependencyVersionPolicy::Lowest,
            allow_prerelease: false,
            prefer_listed: true,
            target_framework: None,
            skip_missing: false,
        }
    }
}

impl WalkOptions {
    pub fn with_policy(mut self, policy: DependencyVersionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = allow;
        self
    }

    pub fn with_target_framework(mut self, framework: impl Into<String>) -> Self {
        self.target_framework = Some(framework.into());
        self
    }

    pub fn with_skip_missing(mut self, skip: bool) -> Self {
        self.skip_missing = skip;
        self
    }

    fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions::default()
            .with_policy(self.policy)
            .with_prerelease(self.allow_prerelease)
            .with_prefer_listed(self.prefer_listed)
    }
}

impl From<ResolveOptions> for WalkOptions {
    fn from(options: ResolveOptions) -> Self {
        Self {
            policy: options.policy,
            allow_prerelease: options.allow_prerelease,
            prefer_listed: options.prefer_listed,
            ..Self::default()
        }
    }
}

/// Walks a package's dependencies through a repository
///
/// Each walk starts from a clean [`PackageMarker`]; the marker is kept after
/// the walk so callers can query dependents.
#[derive(Debug)]
pub struct DependencyWalker {
    repository: Arc<dyn PackageRepository>,
    constraints: Arc<dyn ConstraintProvider>,
    options: WalkOptions,
    marker: PackageMarker,
    path: Vec<PackageIdentity>,
    order: Vec<Package>,
}

impl DependencyWalker {
    pub fn new(repository: Arc<dyn PackageRepository>, options: WalkOptions) -> Self {
        Self {
            repository,
            constraints: Arc::new(NullConstraintProvider),
            options,
            marker: PackageMarker::new(),
            path: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn with_constraints(mut self, constraints: Arc<dyn ConstraintProvider>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// State left by the last walk
    pub fn marker(&self) -> &PackageMarker {
        &self.marker
    }

    /// Resolve `root` and everything it needs
    ///
    /// Returns the packages with every dependency ahead of its dependents;
    /// `root` comes last.
    pub async fn walk(&mut self, root: &Package) -> ResolverResult<Vec<Package>> {
        let started = Instant::now();
        self.marker.clear();
        self.path.clear();
        self.order.clear();

        let _scope = self
            .repository
            .start_operation("walk", Some(&root.identity()));
        self.visit(root.clone()).await?;

        info!(
            root = %root.identity(),
            packages = self.order.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dependency walk finished"
        );
        Ok(std::mem::take(&mut self.order))
    }

    fn visit(&mut self, package: Package) -> Pin<Box<dyn Future<Output = ResolverResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.marker.is_cycle(&package) {
                return Err(self.cycle_error(&package));
            }
            if self.marker.is_visited(&package) {
                return Ok(());
            }

            self.marker.mark_processing(&package);
            self.path.push(package.identity());

            let dependencies = package
                .dependencies_for(self.options.target_framework.as_deref())
                .to_vec();
            let options = self.options.resolve_options();

            for dependency in dependencies {
                let resolved = self
                    .repository
                    .resolve_dependency(&dependency, self.constraints.as_ref(), &options)
                    .await?;

                match resolved {
                    Some(found) => {
                        debug!(package = %package.identity(), dependency = %found.identity(), "Resolved dependency");
                        self.marker.add_dependent(&package, &found);
                        self.visit(found).await?;
                    },
                    None if self.options.skip_missing => {
                        warn!(package = %package.identity(), dependency = %dependency, "Skipping unresolved dependency");
                    },
                    None => return Err(unresolved(&dependency)),
                }
            }

            self.path.pop();
            self.marker.mark_visited(&package);
            self.order.push(package);
            Ok(())
        })
    }

    fn cycle_error(&self, package: &Package) -> SprigError {
        let identity = package.identity();
        let start = self
            .path
            .iter()
            .position(|entry| *entry == identity)
            .unwrap_or(0);
        let cycle = self.path[start..]
            .iter()
            .chain(std::iter::once(&identity))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        SprigError::CircularDependency { cycle }
    }
}

fn unresolved(dependency: &Dependency) -> SprigError {
    SprigError::UnresolvedDependency {
        id: dependency.id.to_string(),
        range: dependency
            .range
            .as_ref()
            .map(|range| format!(" {}", range.to_pretty_string()))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests;
