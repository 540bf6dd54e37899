//! In-memory repository.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

use sprig_core::types::{Package, PackageId, PackageIdentity, Version};

use crate::operation::OperationScope;
use crate::repository::{CloneableRepository, OperationAwareRepository, PackageRepository};
use crate::RepositoryResult;

/// Mutable package store held in memory
///
/// Packages are keyed by identity, so adding an id/version that is already
/// present replaces it. Operations started against the repository are
/// recorded and can be inspected with [`MemoryRepository::operations`].
#[derive(Debug)]
pub struct MemoryRepository {
    source: String,
    packages: RwLock<IndexMap<PackageIdentity, Package>>,
    operations: RwLock<Vec<String>>,
}

impl MemoryRepository {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            packages: RwLock::new(IndexMap::new()),
            operations: RwLock::new(Vec::new()),
        }
    }

    pub fn with_packages(self, packages: impl IntoIterator<Item = Package>) -> Self {
        for package in packages {
            self.add_package(package);
        }
        self
    }

    /// Insert or replace a package
    pub fn add_package(&self, package: Package) {
        self.packages.write().insert(package.identity(), package);
    }

    /// Remove a package, returning it when it was present
    pub fn remove_package(&self, identity: &PackageIdentity) -> Option<Package> {
        self.packages.write().shift_remove(identity)
    }

    pub fn len(&self) -> usize {
        self.packages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.read().is_empty()
    }

    /// Operations started so far, as `operation` or `operation:package`
    pub fn operations(&self) -> Vec<String> {
        self.operations.read().clone()
    }
}

#[async_trait]
impl PackageRepository for MemoryRepository {
    fn source(&self) -> &str {
        &self.source
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        Ok(self.packages.read().values().cloned().collect())
    }

    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        Ok(self
            .packages
            .read()
            .values()
            .filter(|package| &package.id == id)
            .cloned()
            .collect())
    }

    async fn get_package(&self, id: &PackageId, version: &Version) -> RepositoryResult<Option<Package>> {
        let key = PackageIdentity::new(id.clone(), version.clone());
        Ok(self.packages.read().get(&key).cloned())
    }

    fn operation_aware(&self) -> Option<&dyn OperationAwareRepository> {
        Some(self)
    }

    fn cloneable(&self) -> Option<&dyn CloneableRepository> {
        Some(self)
    }
}

impl OperationAwareRepository for MemoryRepository {
    fn begin_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope {
        let entry = match main_package {
            Some(package) => format!("{}:{}", operation, package.id),
            None => operation.to_string(),
        };
        self.operations.write().push(entry);
        OperationScope::new(&self.source, operation, main_package)
    }
}

impl CloneableRepository for MemoryRepository {
    fn clone_repository(&self) -> Arc<dyn PackageRepository> {
        let copy = MemoryRepository {
            source: self.source.clone(),
            packages: RwLock::new(self.packages.read().clone()),
            operations: RwLock::new(Vec::new()),
        };
        Arc::new(copy)
    }
}
