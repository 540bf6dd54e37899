//! Dependency graph walking for Sprig
//!
//! [`PackageMarker`] tracks which packages a traversal has started and
//! finished, which is enough to detect cycles and answer "who depends on
//! this" afterwards. [`DependencyWalker`] drives a depth-first walk over any
//! [`sprig_repository::PackageRepository`] using a marker.

pub mod marker;
pub mod walker;

// Re-export main types
pub use marker::{PackageMarker, VisitState};
pub use walker::{DependencyWalker, WalkOptions};

use sprig_core::error::SprigError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, SprigError>;
