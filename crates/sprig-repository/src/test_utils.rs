//! Repositories with scripted misbehavior for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sprig_core::types::{Package, PackageId};
use sprig_core::SprigError;

use crate::memory::MemoryRepository;
use crate::repository::PackageRepository;
use crate::RepositoryResult;

/// Fails every query with a source error and counts how often it was asked
#[derive(Debug)]
pub struct FailingRepository {
    source: String,
    calls: AtomicUsize,
}

impl FailingRepository {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> RepositoryResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SprigError::source_message(&self.source, "connection refused"))
    }
}

#[async_trait]
impl PackageRepository for FailingRepository {
    fn source(&self) -> &str {
        &self.source
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        self.fail()
    }

    async fn get_packages_by_id(&self, _id: &PackageId) -> RepositoryResult<Vec<Package>> {
        self.fail()
    }
}

/// Delays every listing before answering from an in-memory store
#[derive(Debug)]
pub struct SlowRepository {
    inner: MemoryRepository,
    delay: Duration,
}

impl SlowRepository {
    pub fn new(inner: MemoryRepository, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl PackageRepository for SlowRepository {
    fn source(&self) -> &str {
        self.inner.source()
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_all_packages().await
    }

    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_packages_by_id(id).await
    }
}

pub fn pkg(id: &str, version: &str) -> Package {
    Package::parse(id, version).unwrap()
}

pub fn id(s: &str) -> PackageId {
    PackageId::new(s).unwrap()
}

/// Route `tracing` output to the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sprig_repository=debug")
        .with_test_writer()
        .try_init();
}
