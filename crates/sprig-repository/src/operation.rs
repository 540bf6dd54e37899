//! Operation-scoped telemetry.
//!
//! An [`OperationScope`] owns a `tracing` span for one logical operation
//! (install, update, restore...) against a repository and logs the elapsed
//! time when dropped. Composite repositories bundle their children's scopes
//! into one guard.

use std::time::Instant;
use tracing::{debug, Span};

use sprig_core::types::PackageIdentity;

/// Guard for an operation started on a repository
#[derive(Debug)]
pub struct OperationScope {
    operation: Option<String>,
    span: Option<Span>,
    started: Instant,
    children: Vec<OperationScope>,
}

impl OperationScope {
    /// A scope that records nothing
    pub fn noop() -> Self {
        Self {
            operation: None,
            span: None,
            started: Instant::now(),
            children: Vec::new(),
        }
    }

    /// Start a scope for `operation` against `source`
    pub fn new(source: &str, operation: &str, main_package: Option<&PackageIdentity>) -> Self {
        let span = tracing::info_span!(
            "repository_operation",
            source = %source,
            operation = %operation,
            package = %main_package.map(|p| p.to_string()).unwrap_or_default(),
        );
        span.in_scope(|| debug!("Operation started"));

        Self {
            operation: Some(operation.to_string()),
            span: Some(span),
            started: Instant::now(),
            children: Vec::new(),
        }
    }

    /// Bundle several scopes so they end together
    pub fn all(scopes: impl IntoIterator<Item = OperationScope>) -> Self {
        Self {
            operation: None,
            span: None,
            started: Instant::now(),
            children: scopes.into_iter().filter(|s| !s.is_noop()).collect(),
        }
    }

    /// Attach child scopes to this one
    pub fn with_children(mut self, scopes: impl IntoIterator<Item = OperationScope>) -> Self {
        self.children
            .extend(scopes.into_iter().filter(|s| !s.is_noop()));
        self
    }

    /// True when neither this scope nor any child records anything
    pub fn is_noop(&self) -> bool {
        self.span.is_none() && self.children.is_empty()
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    pub fn children(&self) -> &[OperationScope] {
        &self.children
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        // children close first
        self.children.clear();
        if let Some(span) = &self.span {
            let elapsed = self.started.elapsed();
            span.in_scope(|| {
                debug!(elapsed_ms = elapsed.as_millis() as u64, "Operation finished");
            });
        }
    }
}
