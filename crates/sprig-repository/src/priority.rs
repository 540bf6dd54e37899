//! Primary-then-secondary lookups.

use async_trait::async_trait;
use std::sync::Arc;

use sprig_core::types::{Package, PackageId, PackageIdentity, Version};

use crate::operation::OperationScope;
use crate::query;
use crate::repository::{clone_or_share, CloneableRepository, OperationAwareRepository, PackageRepository};
use crate::RepositoryResult;

/// Repository that answers from `primary` and only asks `secondary` on a miss
///
/// Bulk listings come from the primary alone.
#[derive(Debug)]
pub struct PriorityRepository {
    primary: Arc<dyn PackageRepository>,
    secondary: Arc<dyn PackageRepository>,
}

impl PriorityRepository {
    pub fn new(primary: Arc<dyn PackageRepository>, secondary: Arc<dyn PackageRepository>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &Arc<dyn PackageRepository> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<dyn PackageRepository> {
        &self.secondary
    }
}

#[async_trait]
impl PackageRepository for PriorityRepository {
    fn source(&self) -> &str {
        self.primary.source()
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        self.primary.get_all_packages().await
    }

    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        let packages = self.primary.get_packages_by_id(id).await?;
        if !packages.is_empty() {
            return Ok(query::distinct_packages(packages));
        }
        Ok(query::distinct_packages(self.secondary.get_packages_by_id(id).await?))
    }

    async fn exists(&self, id: &PackageId, version: &Version) -> RepositoryResult<bool> {
        Ok(self.primary.exists(id, version).await? || self.secondary.exists(id, version).await?)
    }

    async fn get_package(&self, id: &PackageId, version: &Version) -> RepositoryResult<Option<Package>> {
        match self.primary.get_package(id, version).await? {
            Some(package) => Ok(Some(package)),
            None => self.secondary.get_package(id, version).await,
        }
    }

    fn operation_aware(&self) -> Option<&dyn OperationAwareRepository> {
        Some(self)
    }

    fn cloneable(&self) -> Option<&dyn CloneableRepository> {
        Some(self)
    }
}

impl OperationAwareRepository for PriorityRepository {
    fn begin_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope {
        OperationScope::all([
            self.primary.start_operation(operation, main_package),
            self.secondary.start_operation(operation, main_package),
        ])
    }
}

impl CloneableRepository for PriorityRepository {
    fn clone_repository(&self) -> Arc<dyn PackageRepository> {
        Arc::new(Self::new(clone_or_share(&self.primary), clone_or_share(&self.secondary)))
    }
}
