//! Deferred repository construction.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use sprig_core::types::{
    ConstraintProvider, Dependency, Package, PackageId, PackageIdentity, PackageSource, Version,
    VersionRange,
};

use crate::factory::RepositoryFactory;
use crate::operation::OperationScope;
use crate::query::{QueryFilter, UpdateOptions};
use crate::repository::{
    CloneableRepository, LatestPackageLookup, OperationAwareRepository, PackageRepository,
    ServiceBasedRepository,
};
use crate::resolve::ResolveOptions;
use crate::RepositoryResult;

/// Repository created by its factory on first use
///
/// The backend is built at most once and kept for the lifetime of the
/// wrapper. A failed creation is reported to the caller and retried on the
/// next access.
#[derive(Debug)]
pub struct LazyRepository {
    factory: Arc<dyn RepositoryFactory>,
    source: PackageSource,
    inner: Mutex<Option<Arc<dyn PackageRepository>>>,
}

impl LazyRepository {
    pub fn new(factory: Arc<dyn RepositoryFactory>, source: PackageSource) -> Self {
        Self {
            factory,
            source,
            inner: Mutex::new(None),
        }
    }

    pub fn package_source(&self) -> &PackageSource {
        &self.source
    }

    pub fn is_materialized(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// The backing repository, creating it if needed
    pub fn repository(&self) -> RepositoryResult<Arc<dyn PackageRepository>> {
        let mut inner = self.inner.lock();
        if let Some(repository) = inner.as_ref() {
            return Ok(Arc::clone(repository));
        }

        debug!(source = %self.source, "Creating repository on first use");
        let repository = self.factory.create_repository(&self.source.source)?;
        *inner = Some(Arc::clone(&repository));
        Ok(repository)
    }

    /// Whether the backend exists and passes `probe`
    fn backend_supports(&self, probe: impl Fn(&dyn PackageRepository) -> bool) -> bool {
        self.repository()
            .map(|repository| probe(repository.as_ref()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PackageRepository for LazyRepository {
    fn source(&self) -> &str {
        &self.source.source
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        self.repository()?.get_all_packages().await
    }

    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        self.repository()?.get_packages_by_id(id).await
    }

    async fn exists(&self, id: &PackageId, version: &Version) -> RepositoryResult<bool> {
        self.repository()?.exists(id, version).await
    }

    async fn get_package(&self, id: &PackageId, version: &Version) -> RepositoryResult<Option<Package>> {
        self.repository()?.get_package(id, version).await
    }

    fn latest_lookup(&self) -> Option<&dyn LatestPackageLookup> {
        self.backend_supports(|r| r.latest_lookup().is_some())
            .then_some(self as &dyn LatestPackageLookup)
    }

    fn service(&self) -> Option<&dyn ServiceBasedRepository> {
        self.backend_supports(|r| r.service().is_some())
            .then_some(self as &dyn ServiceBasedRepository)
    }

    fn operation_aware(&self) -> Option<&dyn OperationAwareRepository> {
        self.backend_supports(|r| r.operation_aware().is_some())
            .then_some(self as &dyn OperationAwareRepository)
    }

    fn cloneable(&self) -> Option<&dyn CloneableRepository> {
        self.backend_supports(|r| r.cloneable().is_some())
            .then_some(self as &dyn CloneableRepository)
    }

    async fn find_packages(
        &self,
        id: &PackageId,
        range: Option<&VersionRange>,
        filter: QueryFilter,
    ) -> RepositoryResult<Vec<Package>> {
        self.repository()?.find_packages(id, range, filter).await
    }

    async fn find_package(
        &self,
        id: &PackageId,
        version: Option<&Version>,
        constraints: Option<&dyn ConstraintProvider>,
        filter: QueryFilter,
    ) -> RepositoryResult<Option<Package>> {
        self.repository()?
            .find_package(id, version, constraints, filter)
            .await
    }

    async fn find_latest(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> RepositoryResult<Option<Package>> {
        self.repository()?
            .find_latest(id, include_prerelease, include_unlisted)
            .await
    }

    async fn search(&self, search_term: &str, filter: QueryFilter) -> RepositoryResult<Vec<Package>> {
        self.repository()?.search(search_term, filter).await
    }

    async fn get_updates(
        &self,
        installed: &[PackageIdentity],
        options: UpdateOptions,
        constraints: Option<&[Option<VersionRange>]>,
    ) -> RepositoryResult<Vec<Package>> {
        self.repository()?
            .get_updates(installed, options, constraints)
            .await
    }

    async fn resolve_dependency(
        &self,
        dependency: &Dependency,
        constraints: &dyn ConstraintProvider,
        options: &ResolveOptions,
    ) -> RepositoryResult<Option<Package>> {
        self.repository()?
            .resolve_dependency(dependency, constraints, options)
            .await
    }

    fn start_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope {
        match self.repository() {
            Ok(repository) => repository.start_operation(operation, main_package),
            Err(error) => {
                warn!(source = %self.source, error = %error, "Repository unavailable, operation not tracked");
                OperationScope::noop()
            },
        }
    }

    fn try_clone(&self) -> RepositoryResult<Arc<dyn PackageRepository>> {
        self.repository()?.try_clone()
    }
}

#[async_trait]
impl LatestPackageLookup for LazyRepository {
    async fn find_latest_package(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> RepositoryResult<Option<Package>> {
        self.find_latest(id, include_prerelease, include_unlisted).await
    }
}

#[async_trait]
impl ServiceBasedRepository for LazyRepository {
    async fn remote_search(&self, search_term: &str, filter: QueryFilter) -> RepositoryResult<Vec<Package>> {
        self.search(search_term, filter).await
    }

    async fn remote_updates(
        &self,
        installed: &[PackageIdentity],
        options: UpdateOptions,
        constraints: Option<&[Option<VersionRange>]>,
    ) -> RepositoryResult<Vec<Package>> {
        self.get_updates(installed, options, constraints).await
    }
}

impl OperationAwareRepository for LazyRepository {
    fn begin_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope {
        self.start_operation(operation, main_package)
    }
}

impl CloneableRepository for LazyRepository {
    /// A copy of the backend, or a fresh wrapper over the same source when
    /// the backend cannot be copied
    fn clone_repository(&self) -> Arc<dyn PackageRepository> {
        match self.try_clone() {
            Ok(copy) => copy,
            Err(error) => {
                warn!(source = %self.source, error = %error, "Backend not cloneable, wrapping source again");
                Arc::new(Self::new(Arc::clone(&self.factory), self.source.clone()))
            },
        }
    }
}
