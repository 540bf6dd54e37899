//! The repository contract and its optional capabilities.
//!
//! A backend implements [`PackageRepository::source`] and
//! [`PackageRepository::get_all_packages`]; everything else has a default
//! built on those primitives. Optional behaviors are separate capability
//! traits, discovered at runtime through the accessor methods
//! ([`PackageRepository::latest_lookup`] and friends) or the
//! [`Capabilities`] set. The defaults consult those accessors before falling
//! back to the composed implementation, so an override only ever changes how
//! fast (or where) a result is produced, never what it contains.

use async_trait::async_trait;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;

use sprig_core::types::{
    ConstraintProvider, Dependency, Package, PackageId, PackageIdentity, Version, VersionRange,
};
use sprig_core::SprigError;

use crate::operation::OperationScope;
use crate::query::{self, QueryFilter, UpdateOptions};
use crate::resolve::{self, ResolveOptions};
use crate::RepositoryResult;

bitflags! {
    /// Optional behaviors a repository instance may support
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Native "latest version of id" lookup
        const LATEST_LOOKUP    = 0b0000_0001;
        /// Server-side search and update computation
        const SERVICE_SEARCH   = 0b0000_0010;
        /// Operation-scoped telemetry spans
        const OPERATION_SCOPES = 0b0000_0100;
        /// Cheap independent copies
        const CLONING          = 0b0000_1000;
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Capabilities, &str); 4] = [
            (Capabilities::LATEST_LOOKUP, "latest lookup"),
            (Capabilities::SERVICE_SEARCH, "service search"),
            (Capabilities::OPERATION_SCOPES, "operation scopes"),
            (Capabilities::CLONING, "cloning"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("no capabilities")
        } else {
            f.write_str(&names.join(", "))
        }
    }
}

/// A queryable collection of packages
#[async_trait]
pub trait PackageRepository: Send + Sync + fmt::Debug {
    /// Location or display name of this repository
    fn source(&self) -> &str;

    /// Every package the repository holds, listed or not
    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>>;

    /// Every version of `id`
    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        Ok(self
            .get_all_packages()
            .await?
            .into_iter()
            .filter(|package| &package.id == id)
            .collect())
    }

    async fn exists(&self, id: &PackageId, version: &Version) -> RepositoryResult<bool> {
        Ok(self.get_package(id, version).await?.is_some())
    }

    /// Exact id/version lookup; unlisted packages are returned too
    async fn get_package(&self, id: &PackageId, version: &Version) -> RepositoryResult<Option<Package>> {
        Ok(self
            .get_packages_by_id(id)
            .await?
            .into_iter()
            .find(|package| &package.version == version))
    }

    fn latest_lookup(&self) -> Option<&dyn LatestPackageLookup> {
        None
    }

    fn service(&self) -> Option<&dyn ServiceBasedRepository> {
        None
    }

    fn operation_aware(&self) -> Option<&dyn OperationAwareRepository> {
        None
    }

    fn cloneable(&self) -> Option<&dyn CloneableRepository> {
        None
    }

    /// Plain unions of other repositories expose them so aggregates can flatten them
    fn nested_repositories(&self) -> Option<&[Arc<dyn PackageRepository>]> {
        None
    }

    /// The set of optional behaviors this instance supports
    fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities::empty();
        capabilities.set(Capabilities::LATEST_LOOKUP, self.latest_lookup().is_some());
        capabilities.set(Capabilities::SERVICE_SEARCH, self.service().is_some());
        capabilities.set(Capabilities::OPERATION_SCOPES, self.operation_aware().is_some());
        capabilities.set(Capabilities::CLONING, self.cloneable().is_some());
        capabilities
    }

    /// Fail with `UnsupportedCapability` unless every flag in `required` is supported
    fn require(&self, required: Capabilities) -> RepositoryResult<()> {
        let missing = required.difference(self.capabilities());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SprigError::unsupported(self.source(), missing.to_string()))
        }
    }

    /// Versions of `id` within `range`, newest first
    async fn find_packages(
        &self,
        id: &PackageId,
        range: Option<&VersionRange>,
        filter: QueryFilter,
    ) -> RepositoryResult<Vec<Package>> {
        query::find_packages(self, id, range, filter).await
    }

    /// A single package by id, optionally pinned to `version`
    ///
    /// An explicit version always allows unlisted packages.
    async fn find_package(
        &self,
        id: &PackageId,
        version: Option<&Version>,
        constraints: Option<&dyn ConstraintProvider>,
        filter: QueryFilter,
    ) -> RepositoryResult<Option<Package>> {
        query::find_package(self, id, version, constraints, filter).await
    }

    async fn find_latest(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> RepositoryResult<Option<Package>> {
        match self.latest_lookup() {
            Some(lookup) => {
                lookup
                    .find_latest_package(id, include_prerelease, include_unlisted)
                    .await
            },
            None => query::find_latest(self, id, include_prerelease, include_unlisted).await,
        }
    }

    async fn search(&self, search_term: &str, filter: QueryFilter) -> RepositoryResult<Vec<Package>> {
        match self.service() {
            Some(service) => service.remote_search(search_term, filter).await,
            None => query::search(self, search_term, filter).await,
        }
    }

    /// Listed packages strictly newer than each installed identity
    ///
    /// `constraints`, when given, must have one entry per installed package.
    async fn get_updates(
        &self,
        installed: &[PackageIdentity],
        options: UpdateOptions,
        constraints: Option<&[Option<VersionRange>]>,
    ) -> RepositoryResult<Vec<Package>> {
        match self.service() {
            Some(service) => service.remote_updates(installed, options, constraints).await,
            None => query::get_updates(self, installed, options, constraints).await,
        }
    }

    /// Pick the package satisfying `dependency`; `None` when nothing does
    async fn resolve_dependency(
        &self,
        dependency: &Dependency,
        constraints: &dyn ConstraintProvider,
        options: &ResolveOptions,
    ) -> RepositoryResult<Option<Package>> {
        resolve::resolve_dependency(self, dependency, constraints, options).await
    }

    /// Open a telemetry scope that lasts until the returned guard is dropped
    fn start_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope {
        match self.operation_aware() {
            Some(aware) => aware.begin_operation(operation, main_package),
            None => OperationScope::noop(),
        }
    }

    fn try_clone(&self) -> RepositoryResult<Arc<dyn PackageRepository>> {
        match self.cloneable() {
            Some(cloneable) => Ok(cloneable.clone_repository()),
            None => Err(SprigError::unsupported(
                self.source(),
                Capabilities::CLONING.to_string(),
            )),
        }
    }
}

/// Native lookup of the newest version of a package
#[async_trait]
pub trait LatestPackageLookup: Send + Sync {
    async fn find_latest_package(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> RepositoryResult<Option<Package>>;
}

/// Search and update computation performed by the backend itself
#[async_trait]
pub trait ServiceBasedRepository: Send + Sync {
    async fn remote_search(&self, search_term: &str, filter: QueryFilter) -> RepositoryResult<Vec<Package>>;

    async fn remote_updates(
        &self,
        installed: &[PackageIdentity],
        options: UpdateOptions,
        constraints: Option<&[Option<VersionRange>]>,
    ) -> RepositoryResult<Vec<Package>>;
}

pub trait OperationAwareRepository: Send + Sync {
    fn begin_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope;
}

pub trait CloneableRepository: Send + Sync {
    /// An independent copy sharing no mutable state with `self`
    fn clone_repository(&self) -> Arc<dyn PackageRepository>;
}

/// Clone `repository` when it supports cloning, otherwise share it
pub fn clone_or_share(repository: &Arc<dyn PackageRepository>) -> Arc<dyn PackageRepository> {
    repository
        .try_clone()
        .unwrap_or_else(|_| Arc::clone(repository))
}
