//! Aggregate repository: many sources queried as one.
//!
//! Listing queries fan out to every source concurrently, each bounded by
//! [`AggregateOptions::source_timeout`] and abandoned when the aggregate's
//! [`CancellationToken`] fires. Results are merged by package identity and
//! re-sorted by id then version, so completion order never leaks into the
//! output. Point lookups (`exists`, `get_package`) walk the sources in order
//! and stop at the first hit.
//!
//! A source that fails while `ignore_failing_sources` is set is logged,
//! remembered, and skipped by every later call on the same aggregate. With
//! isolation disabled the first source failure fails the whole call.

use async_trait::async_trait;
use dashmap::DashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sprig_core::types::{
    ConstraintProvider, DefaultConstraintProvider, Dependency, Package, PackageId, PackageIdentity,
    PackageSource, Version, VersionRange,
};
use sprig_core::SprigError;

use crate::factory::RepositoryFactory;
use crate::operation::OperationScope;
use crate::query::{self, QueryFilter, UpdateOptions};
use crate::repository::{
    clone_or_share, CloneableRepository, LatestPackageLookup, OperationAwareRepository,
    PackageRepository, ServiceBasedRepository,
};
use crate::resolve::{self, ResolveOptions};
use crate::RepositoryResult;

/// Display name used as the aggregate's source
pub const AGGREGATE_SOURCE: &str = "(Aggregate source)";

/// Failure and concurrency policy for an [`AggregateRepository`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Isolate failing sources instead of failing the call
    pub ignore_failing_sources: bool,
    /// Race every source in `resolve_dependency` and take the first match
    pub resolve_vertically: bool,
    /// Upper bound on a single source's query
    pub source_timeout: Duration,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            ignore_failing_sources: true,
            resolve_vertically: false,
            source_timeout: Duration::from_secs(30),
        }
    }
}

impl AggregateOptions {
    pub fn with_ignore_failing_sources(mut self, ignore: bool) -> Self {
        self.ignore_failing_sources = ignore;
        self
    }

    pub fn with_resolve_vertically(mut self, vertically: bool) -> Self {
        self.resolve_vertically = vertically;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }
}

#[derive(Debug)]
pub struct AggregateRepository {
    repositories: Vec<Arc<dyn PackageRepository>>,
    options: AggregateOptions,
    /// Indexes into `repositories`; only ever grows
    failing: DashSet<usize>,
    cancellation: CancellationToken,
}

impl AggregateRepository {
    /// Aggregate `repositories`, flattening any nested aggregates
    ///
    /// A nested aggregate contributes only its sources. Its options, its
    /// cancellation token and the sources it has already marked failing are
    /// discarded; `options` and the new aggregate's own state govern every
    /// flattened source.
    pub fn new(
        repositories: impl IntoIterator<Item = Arc<dyn PackageRepository>>,
        options: AggregateOptions,
    ) -> Self {
        Self {
            repositories: flatten(repositories),
            options,
            failing: DashSet::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use `token` to abandon in-flight source queries
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Build an aggregate over the enabled `sources`
    ///
    /// When failing sources are ignored, sources the factory cannot create
    /// are skipped with a warning; otherwise the first such error is returned.
    pub fn from_sources(
        factory: &dyn RepositoryFactory,
        sources: &[PackageSource],
        options: AggregateOptions,
    ) -> RepositoryResult<Self> {
        let mut repositories = Vec::new();
        for source in sources.iter().filter(|source| source.enabled) {
            match factory.create_repository(&source.source) {
                Ok(repository) => repositories.push(repository),
                Err(error) if options.ignore_failing_sources => {
                    warn!(source = %source, error = %error, "Skipping package source that could not be created");
                },
                Err(error) => return Err(error),
            }
        }
        Ok(Self::new(repositories, options))
    }

    /// Like [`AggregateRepository::from_sources`], but a single enabled
    /// source is returned directly instead of being wrapped
    pub fn create(
        factory: &dyn RepositoryFactory,
        sources: &[PackageSource],
        options: AggregateOptions,
    ) -> RepositoryResult<Arc<dyn PackageRepository>> {
        let enabled: Vec<&PackageSource> = sources.iter().filter(|source| source.enabled).collect();
        if let [single] = enabled.as_slice() {
            return factory.create_repository(&single.source);
        }
        Ok(Arc::new(Self::from_sources(factory, sources, options)?))
    }

    pub fn repositories(&self) -> &[Arc<dyn PackageRepository>] {
        &self.repositories
    }

    pub fn options(&self) -> &AggregateOptions {
        &self.options
    }

    /// Sources that failed and are skipped from now on, in source order
    pub fn failing_sources(&self) -> Vec<String> {
        self.repositories
            .iter()
            .enumerate()
            .filter(|(index, _)| self.failing.contains(index))
            .map(|(_, repository)| repository.source().to_string())
            .collect()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Abandon in-flight queries; later calls fail with `Cancelled`
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    fn active(&self) -> impl Iterator<Item = (usize, &Arc<dyn PackageRepository>)> + '_ {
        self.repositories
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.failing.contains(index))
    }

    /// Decide whether a source error is isolated (`Ok`) or propagated
    fn handle_failure(&self, index: usize, error: SprigError) -> RepositoryResult<()> {
        if !(self.options.ignore_failing_sources && error.is_source_failure()) {
            return Err(error);
        }

        if self.failing.insert(index) {
            let source = self
                .repositories
                .get(index)
                .map(|repository| repository.source())
                .unwrap_or(AGGREGATE_SOURCE);
            warn!(source, error = %error, "Package source failed and will be skipped");
        }
        Ok(())
    }

    fn handle_task_failure(&self, operation: &'static str, error: JoinError) -> RepositoryResult<()> {
        if error.is_cancelled() {
            return Ok(());
        }
        let error = SprigError::source_failure(
            AGGREGATE_SOURCE,
            format!("{} task did not complete", operation),
            error,
        );
        if self.options.ignore_failing_sources {
            warn!(operation, error = %error, "Ignoring failed source task");
            Ok(())
        } else {
            Err(error)
        }
    }

    /// Run `query` against every active source concurrently
    ///
    /// Results come back in source order.
    async fn fan_out<T, F, Fut>(&self, operation: &'static str, query: F) -> RepositoryResult<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn PackageRepository>) -> Fut + Send,
        Fut: Future<Output = RepositoryResult<T>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for (index, repository) in self.active() {
            let guarded = guard(
                operation,
                repository.source().to_string(),
                self.options.source_timeout,
                self.cancellation.child_token(),
                query(Arc::clone(repository)),
            );
            tasks.spawn(async move { (index, guarded.await) });
        }
        debug!(operation, sources = tasks.len(), "Querying package sources");

        let mut results = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(value))) => results.push((index, value)),
                Ok((index, Err(error))) => {
                    if let Err(error) = self.handle_failure(index, error) {
                        tasks.abort_all();
                        return Err(error);
                    }
                },
                Err(error) => self.handle_task_failure(operation, error)?,
            }
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }

    /// Ask active sources one at a time and return the first hit
    async fn first_hit<T, F, Fut>(&self, operation: &'static str, query: F) -> RepositoryResult<Option<T>>
    where
        T: Send,
        F: Fn(Arc<dyn PackageRepository>) -> Fut + Send,
        Fut: Future<Output = RepositoryResult<Option<T>>> + Send,
    {
        for (index, repository) in self.active() {
            let outcome = guard(
                operation,
                repository.source().to_string(),
                self.options.source_timeout,
                self.cancellation.child_token(),
                query(Arc::clone(repository)),
            )
            .await;

            match outcome {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => {},
                Err(error) => self.handle_failure(index, error)?,
            }
        }
        Ok(None)
    }

    async fn resolve_vertically(
        &self,
        dependency: &Dependency,
        constraints: &dyn ConstraintProvider,
        options: &ResolveOptions,
    ) -> RepositoryResult<Option<Package>> {
        // Tasks outlive the borrowed provider, so they get this id's constraint only
        let mut snapshot = DefaultConstraintProvider::new();
        if let Some(range) = constraints.constraint(&dependency.id) {
            snapshot.add(dependency.id.clone(), range);
        }
        let snapshot = Arc::new(snapshot);

        let mut tasks = JoinSet::new();
        for (index, repository) in self.active() {
            let source = repository.source().to_string();
            let repository = Arc::clone(repository);
            let dependency = dependency.clone();
            let snapshot = Arc::clone(&snapshot);
            let options = *options;
            let query = async move {
                repository
                    .resolve_dependency(&dependency, &*snapshot, &options)
                    .await
            };
            let guarded = guard(
                "resolve_dependency",
                source,
                self.options.source_timeout,
                self.cancellation.child_token(),
                query,
            );
            tasks.spawn(async move { (index, guarded.await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(package)))) => {
                    tasks.abort_all();
                    return Ok(Some(package));
                },
                Ok((_, Ok(None))) => {},
                Ok((index, Err(error))) => {
                    if let Err(error) = self.handle_failure(index, error) {
                        tasks.abort_all();
                        return Err(error);
                    }
                },
                Err(error) => self.handle_task_failure("resolve_dependency", error)?,
            }
        }
        Ok(None)
    }
}

/// Bound one source query by the timeout and the cancellation token
async fn guard<T>(
    operation: &'static str,
    source: String,
    timeout: Duration,
    cancellation: CancellationToken,
    query: impl Future<Output = RepositoryResult<T>>,
) -> RepositoryResult<T> {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(SprigError::Cancelled {
            operation: operation.to_string(),
        }),
        outcome = tokio::time::timeout(timeout, query) => match outcome {
            Ok(result) => result,
            Err(_) => Err(SprigError::SourceTimeout {
                repository: source,
                timeout,
            }),
        },
    }
}

fn flatten(repositories: impl IntoIterator<Item = Arc<dyn PackageRepository>>) -> Vec<Arc<dyn PackageRepository>> {
    let mut flat = Vec::new();
    for repository in repositories {
        let nested = repository.nested_repositories().map(<[_]>::to_vec);
        match nested {
            Some(nested) => flat.extend(flatten(nested)),
            None => flat.push(repository),
        }
    }
    flat
}

/// Union by identity, ordered by id then version
fn merge(results: Vec<Vec<Package>>) -> Vec<Package> {
    let mut packages = query::distinct_packages(results.into_iter().flatten());
    query::sort_packages(&mut packages);
    packages
}

#[async_trait]
impl PackageRepository for AggregateRepository {
    fn source(&self) -> &str {
        AGGREGATE_SOURCE
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        let results = self
            .fan_out("get_all_packages", |repository| async move {
                repository.get_all_packages().await
            })
            .await?;
        Ok(merge(results))
    }

    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        let id = id.clone();
        let results = self
            .fan_out("get_packages_by_id", move |repository| {
                let id = id.clone();
                async move { repository.get_packages_by_id(&id).await }
            })
            .await?;
        Ok(merge(results))
    }

    async fn exists(&self, id: &PackageId, version: &Version) -> RepositoryResult<bool> {
        let found = self
            .first_hit("exists", |repository| async move {
                let exists = repository.exists(id, version).await?;
                Ok::<_, SprigError>(exists.then_some(()))
            })
            .await?;
        Ok(found.is_some())
    }

    async fn get_package(&self, id: &PackageId, version: &Version) -> RepositoryResult<Option<Package>> {
        self.first_hit("get_package", |repository| async move {
            repository.get_package(id, version).await
        })
        .await
    }

    fn latest_lookup(&self) -> Option<&dyn LatestPackageLookup> {
        Some(self)
    }

    fn service(&self) -> Option<&dyn ServiceBasedRepository> {
        Some(self)
    }

    fn operation_aware(&self) -> Option<&dyn OperationAwareRepository> {
        Some(self)
    }

    fn cloneable(&self) -> Option<&dyn CloneableRepository> {
        Some(self)
    }

    fn nested_repositories(&self) -> Option<&[Arc<dyn PackageRepository>]> {
        Some(&self.repositories)
    }

    async fn resolve_dependency(
        &self,
        dependency: &Dependency,
        constraints: &dyn ConstraintProvider,
        options: &ResolveOptions,
    ) -> RepositoryResult<Option<Package>> {
        if self.options.resolve_vertically {
            self.resolve_vertically(dependency, constraints, options).await
        } else {
            resolve::resolve_dependency(self, dependency, constraints, options).await
        }
    }
}

#[async_trait]
impl LatestPackageLookup for AggregateRepository {
    async fn find_latest_package(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> RepositoryResult<Option<Package>> {
        let id = id.clone();
        let results = self
            .fan_out("find_latest", move |repository| {
                let id = id.clone();
                async move {
                    repository
                        .find_latest(&id, include_prerelease, include_unlisted)
                        .await
                }
            })
            .await?;

        // ties keep the earlier source
        Ok(results.into_iter().flatten().fold(None, |best: Option<Package>, package| match best {
            Some(best) if best.version >= package.version => Some(best),
            _ => Some(package),
        }))
    }
}

#[async_trait]
impl ServiceBasedRepository for AggregateRepository {
    async fn remote_search(&self, search_term: &str, filter: QueryFilter) -> RepositoryResult<Vec<Package>> {
        let search_term = search_term.to_string();
        let results = self
            .fan_out("search", move |repository| {
                let search_term = search_term.clone();
                async move { repository.search(&search_term, filter).await }
            })
            .await?;
        Ok(merge(results))
    }

    async fn remote_updates(
        &self,
        installed: &[PackageIdentity],
        options: UpdateOptions,
        constraints: Option<&[Option<VersionRange>]>,
    ) -> RepositoryResult<Vec<Package>> {
        if installed.is_empty() {
            return Ok(Vec::new());
        }
        query::check_constraint_count(installed, constraints)?;

        let installed = installed.to_vec();
        let constraints = constraints.map(<[_]>::to_vec);
        let results = self
            .fan_out("get_updates", move |repository| {
                let installed = installed.clone();
                let constraints = constraints.clone();
                async move {
                    repository
                        .get_updates(&installed, options, constraints.as_deref())
                        .await
                }
            })
            .await?;

        let updates = merge(results);
        if options.include_all_versions {
            Ok(updates)
        } else {
            let mut collapsed = query::collapse_by_id(updates);
            query::sort_packages(&mut collapsed);
            Ok(collapsed)
        }
    }
}

impl OperationAwareRepository for AggregateRepository {
    fn begin_operation(&self, operation: &str, main_package: Option<&PackageIdentity>) -> OperationScope {
        OperationScope::new(AGGREGATE_SOURCE, operation, main_package).with_children(
            self.active()
                .map(|(_, repository)| repository.start_operation(operation, main_package)),
        )
    }
}

impl CloneableRepository for AggregateRepository {
    fn clone_repository(&self) -> Arc<dyn PackageRepository> {
        Arc::new(AggregateRepository {
            repositories: self.repositories.iter().map(clone_or_share).collect(),
            options: self.options.clone(),
            failing: DashSet::new(),
            cancellation: CancellationToken::new(),
        })
    }
}

#[cfg(test)]
mod tests;
