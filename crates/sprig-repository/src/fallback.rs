//! Separate sources for browsing and for dependency expansion.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use sprig_core::types::{
    ConstraintProvider, Dependency, Package, PackageId, PackageIdentity, Version, VersionRange,
};

use crate::operation::OperationScope;
use crate::query::{QueryFilter, UpdateOptions};
use crate::repository::{
    clone_or_share, CloneableRepository, LatestPackageLookup, PackageRepository, ServiceBasedRepository,
};
use crate::resolve::ResolveOptions;
use crate::RepositoryResult;

/// Repository backed by `primary`, with `dependency_resolver` consulted only
/// for dependencies the primary cannot satisfy
#[derive(Debug)]
pub struct FallbackRepository {
    primary: Arc<dyn PackageRepository>,
    dependency_resolver: Arc<dyn PackageRepository>,
}

impl FallbackRepository {
    pub fn new(primary: Arc<dyn PackageRepository>, dependency_resolver: Arc<dyn PackageRepository>) -> Self {
        Self {
            primary,
            dependency_resolver,
        }
    }

    pub fn primary(&self) -> &Arc<dyn PackageRepository> {
        &self.primary
    }

    pub fn dependency_resolver(&self) -> &Arc<dyn PackageRepository> {
        &self.dependency_resolver
    }
}

#[async_trait]
impl PackageRepository for FallbackRepository {
    fn source(&self) -> &str {
        self.primary.source()
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        self.primary.get_all_packages().await
    }

    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        self.primary.get_packages_by_id(id).await
    }

    async fn exists(&self, id: &PackageId, version: &Version) -> RepositoryResult<bool> {
        self.primary.exists(id, version).await
    }

    async fn get_package(&self, id: &PackageId, version: &Version) -> RepositoryResult<Option<Package>> {
        self.primary.get_package(id, version).await
    }

    fn latest_lookup(&self) -> Option<&dyn LatestPackageLookup> {
        self.primary.latest_lookup()
    }

    fn service(&self) -> Option<&dyn ServiceBasedRepository> {
        self.primary.service()
    }

    fn cloneable(&self) -> Option<&dyn CloneableRepository> {
        Some(self)
    }

    async fn find_packages(
        &self,
        id: &PackageId,
        range: Option<&VersionRange>,
        filter: QueryFilter,
    ) -> RepositoryResult<Vec<Package>> {
        self.primary.find_packages(id, range, filter).await
    }

    async fn find_package(
        &self,
        id: &PackageId,
        version: Option<&Version>,
        constraints: Option<&dyn ConstraintProvider>,
        filter: QueryFilter,
    ) -> RepositoryResult<Option<Package>> {
        self.primary.find_package(id, version, constraints, filter).await
    }

    async fn find_latest(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> RepositoryResult<Option<Package>> {
        self.primary
            .find_latest(id, include_prerelease, include_unlisted)
            .await
    }

    async fn search(&self, search_term: &str, filter: QueryFilter) -> RepositoryResult<Vec<Package>> {
        self.primary.search(search_term, filter).await
    }

    async fn get_updates(
        &self,
        installed: &[PackageIdentity],
        options: UpdateOptions,
        constraints: Option<&[Option<VersionRange>]>,
    ) -> RepositoryResult<Vec<Package>> {
        self.primary.get_updates(installed, options, constraints).await
    }

    async fn resolve_dependency(
        &self,
        dependency: &Dependency,
        constraints: &dyn ConstraintProvider,
        options: &ResolveOptions,
    ) -> RepositoryResult<Option<Package>> {
        if let Some(package) = self
            .primary
            .resolve_dependency(dependency, constraints, options)
            .await?
        {
            return Ok(Some(package));
        }

        debug!(
            dependency = %dependency,
            resolver = self.dependency_resolver.source(),
            "Primary source cannot satisfy dependency, trying dependency resolver"
        );
        self.dependency_resolver
            .resolve_dependency(dependency, constraints, options)
            .await
    }

    fn start_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope {
        self.primary.start_operation(operation, main_package)
    }
}

impl CloneableRepository for FallbackRepository {
    fn clone_repository(&self) -> Arc<dyn PackageRepository> {
        Arc::new(Self::new(
            clone_or_share(&self.primary),
            clone_or_share(&self.dependency_resolver),
        ))
    }
}
