//! Constraint providers: extra version ranges layered on top of a dependency.
//!
//! A constraint is typically a pin coming from a lock or project file. When
//! a provider returns a range for an id, candidates must satisfy it in
//! addition to the dependency's own range.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{PackageId, VersionRange};

/// Source of per-package version constraints
pub trait ConstraintProvider: Send + Sync + fmt::Debug {
    /// Constraint for `id`, if any
    fn constraint(&self, id: &PackageId) -> Option<VersionRange>;
}

/// Provider that never constrains anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConstraintProvider;

impl ConstraintProvider for NullConstraintProvider {
    fn constraint(&self, _id: &PackageId) -> Option<VersionRange> {
        None
    }
}

/// In-memory map of constraints
#[derive(Debug, Clone, Default)]
pub struct DefaultConstraintProvider {
    constraints: HashMap<PackageId, VersionRange>,
}

impl DefaultConstraintProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the constraint for `id`
    pub fn add(&mut self, id: PackageId, range: VersionRange) {
        self.constraints.insert(id, range);
    }

    pub fn with_constraint(mut self, id: PackageId, range: VersionRange) -> Self {
        self.add(id, range);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl ConstraintProvider for DefaultConstraintProvider {
    fn constraint(&self, id: &PackageId) -> Option<VersionRange> {
        self.constraints.get(id).cloned()
    }
}

/// Chain of providers; the first one with an answer wins
#[derive(Debug, Clone, Default)]
pub struct AggregateConstraintProvider {
    providers: Vec<Arc<dyn ConstraintProvider>>,
}

impl AggregateConstraintProvider {
    pub fn new(providers: Vec<Arc<dyn ConstraintProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: Arc<dyn ConstraintProvider>) {
        self.providers.push(provider);
    }
}

impl ConstraintProvider for AggregateConstraintProvider {
    fn constraint(&self, id: &PackageId) -> Option<VersionRange> {
        self.providers
            .iter()
            .find_map(|provider| provider.constraint(id))
    }
}
