//! Core data types for Sprig package resolution.
//!
//! This module provides the fundamental types used throughout Sprig:
//! - Versions, their comparison modes and ranges
//! - Package identifiers, identities and records
//! - Dependencies, version policies and constraint providers

pub mod comparer;
pub mod constraint;
pub mod dependency;
pub mod package;
pub mod range;
pub mod source;
pub mod version;

// Re-export all public types
pub use comparer::{ComparedVersion, VersionComparer, VersionComparison};
pub use constraint::{
    AggregateConstraintProvider, ConstraintProvider, DefaultConstraintProvider,
    NullConstraintProvider,
};
pub use dependency::{Dependency, DependencyVersionPolicy};
pub use package::{DependencySet, Package, PackageId, PackageIdentity};
pub use range::VersionRange;
pub use source::PackageSource;
pub use version::{Version, VersionError};
