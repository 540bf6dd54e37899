//! Configuration parsing for Sprig
//!
//! This crate parses and validates sprig.toml, layers environment overrides
//! on top, and turns the result into the option types the repository layer
//! consumes.

pub mod merge;
pub mod toml;

// Re-export main types
pub use merge::{ConfigLayering, ConfigSource};
pub use self::toml::{AggregateSection, ResolutionSection, SourceSection, SprigConfig};

use sprig_core::error::SprigError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, SprigError>;
