//! Visit bookkeeping for one dependency graph traversal.
//!
//! Every package a walk touches is marked [`VisitState::Processing`] while
//! its dependencies are expanded and [`VisitState::Completed`] once they
//! are. Meeting a package that is still processing means the walk has come
//! back around to something on its own path: a cycle. Meeting a completed
//! package is plain reuse.
//!
//! The marker also records "X depends on Y" edges so the caller can ask
//! which packages would be affected by removing one. It is meant for a
//! single traversal at a time; [`PackageMarker::clear`] resets it.

use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

use sprig_core::types::{Package, PackageId, PackageIdentity};

/// Progress of one package within a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// On the active path
    Processing,
    /// Fully expanded; safe to reuse
    Completed,
}

#[derive(Debug, Clone)]
struct MarkedPackage {
    package: Package,
    state: VisitState,
}

#[derive(Debug, Default)]
pub struct PackageMarker {
    visited: IndexMap<PackageId, IndexMap<PackageIdentity, MarkedPackage>>,
    /// dependency -> packages that depend on it
    dependents: IndexMap<PackageIdentity, IndexSet<PackageIdentity>>,
}

impl PackageMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_processing(&mut self, package: &Package) {
        self.mark(package, VisitState::Processing);
    }

    pub fn mark_visited(&mut self, package: &Package) {
        self.mark(package, VisitState::Completed);
    }

    fn mark(&mut self, package: &Package, state: VisitState) {
        let versions = self.visited.entry(package.id.clone()).or_default();
        versions
            .entry(package.identity())
            .and_modify(|marked| marked.state = state)
            .or_insert_with(|| MarkedPackage {
                package: package.clone(),
                state,
            });
    }

    fn entry(&self, identity: &PackageIdentity) -> Option<&MarkedPackage> {
        self.visited.get(&identity.id)?.get(identity)
    }

    pub fn state(&self, package: &Package) -> Option<VisitState> {
        self.entry(&package.identity()).map(|marked| marked.state)
    }

    pub fn contains(&self, package: &Package) -> bool {
        self.state(package).is_some()
    }

    /// True when `package` is on the active path
    pub fn is_cycle(&self, package: &Package) -> bool {
        self.state(package) == Some(VisitState::Processing)
    }

    pub fn is_visited(&self, package: &Package) -> bool {
        self.state(package) == Some(VisitState::Completed)
    }

    /// True when any version of `id` is on the active path
    pub fn is_version_cycle(&self, id: &PackageId) -> bool {
        self.visited.get(id).is_some_and(|versions| {
            versions
                .values()
                .any(|marked| marked.state == VisitState::Processing)
        })
    }

    /// Record that `package` depends on `dependency`
    pub fn add_dependent(&mut self, package: &Package, dependency: &Package) {
        self.dependents
            .entry(dependency.identity())
            .or_default()
            .insert(package.identity());
    }

    /// Packages that directly depend on `package`
    pub fn dependents(&self, package: &Package) -> Vec<&Package> {
        self.dependents
            .get(&package.identity())
            .into_iter()
            .flatten()
            .filter_map(|identity| self.entry(identity))
            .map(|marked| &marked.package)
            .collect()
    }

    /// Packages that depend on `package` directly or through others,
    /// nearest first
    pub fn transitive_dependents(&self, package: &Package) -> Vec<&Package> {
        let start = package.identity();
        let mut seen: IndexSet<PackageIdentity> = IndexSet::new();
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents.get(&current).into_iter().flatten() {
                if *dependent != start && seen.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }

        seen.iter()
            .filter_map(|identity| self.entry(identity))
            .map(|marked| &marked.package)
            .collect()
    }

    /// Completed packages, in the order they were first marked
    pub fn packages(&self) -> Vec<&Package> {
        self.marked()
            .filter(|marked| marked.state == VisitState::Completed)
            .map(|marked| &marked.package)
            .collect()
    }

    /// Every marked package, whatever its state
    pub fn visited_packages(&self) -> Vec<&Package> {
        self.marked().map(|marked| &marked.package).collect()
    }

    pub fn packages_by_id(&self, id: &PackageId) -> Vec<&Package> {
        self.visited
            .get(id)
            .into_iter()
            .flat_map(|versions| versions.values())
            .map(|marked| &marked.package)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.visited.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all marks and dependents
    pub fn clear(&mut self) {
        self.visited.clear();
        self.dependents.clear();
    }

    fn marked(&self) -> impl Iterator<Item = &MarkedPackage> {
        self.visited.values().flat_map(|versions| versions.values())
    }
}
