//! Package repositories for Sprig
//!
//! This crate provides the repository abstraction every consumer queries for
//! candidate packages, the dependency resolution algorithm built on it, the
//! in-memory and filesystem backends, and the composition layers: aggregate
//! fan-out across sources plus priority, fallback and lazy decorators.

pub mod aggregate;
pub mod factory;
pub mod fallback;
pub mod lazy;
pub mod local;
pub mod memory;
pub mod operation;
pub mod priority;
pub mod query;
pub mod repository;
pub mod resolve;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export main types
pub use aggregate::{AggregateOptions, AggregateRepository};
pub use factory::{DefaultRepositoryFactory, RepositoryFactory};
pub use fallback::FallbackRepository;
pub use lazy::LazyRepository;
pub use local::LocalRepository;
pub use memory::MemoryRepository;
pub use operation::OperationScope;
pub use priority::PriorityRepository;
pub use query::{QueryFilter, UpdateOptions};
pub use repository::{
    Capabilities, CloneableRepository, LatestPackageLookup, OperationAwareRepository,
    PackageRepository, ServiceBasedRepository,
};
pub use resolve::{select_dependency, ResolveOptions};

use sprig_core::error::SprigError;

/// Result type for repository operations
pub type RepositoryResult<T> = Result<T, SprigError>;
