//! # sprig-core
//!
//! Core types shared across all Sprig crates.
//!
//! This crate provides:
//! - `Version` with four comparison modes and `VersionRange` interval notation
//! - `PackageId`, `PackageIdentity` and the read-only `Package` record
//! - `Dependency`, `DependencyVersionPolicy` and constraint providers
//! - `SprigError` enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, Package, Dependency, etc.)
//! - `error`: Error types and result aliases

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{SprigError, SprigResult};
pub use types::{
    ConstraintProvider, Dependency, DependencySet, DependencyVersionPolicy, Package, PackageId,
    PackageIdentity, PackageSource, Version, VersionComparer, VersionComparison, VersionError,
    VersionRange,
};
