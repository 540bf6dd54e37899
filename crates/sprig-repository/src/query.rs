//! Default implementations of the higher-level repository queries.
//!
//! Everything here is expressed over the four primitives of
//! [`PackageRepository`], so any backend gets these for free. Unless the
//! [`QueryFilter`] says otherwise, prerelease and unlisted packages are
//! excluded.

use indexmap::IndexMap;
use std::collections::HashMap;

use sprig_core::types::{
    ConstraintProvider, Package, PackageId, PackageIdentity, Version, VersionRange,
};
use sprig_core::SprigError;

use crate::repository::PackageRepository;
use crate::RepositoryResult;

/// Which otherwise-hidden packages a query may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFilter {
    pub include_prerelease: bool,
    pub include_unlisted: bool,
}

impl QueryFilter {
    /// Include everything
    pub fn all() -> Self {
        Self {
            include_prerelease: true,
            include_unlisted: true,
        }
    }

    pub fn with_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    pub fn with_unlisted(mut self, include: bool) -> Self {
        self.include_unlisted = include;
        self
    }

    pub fn accepts(&self, package: &Package) -> bool {
        (self.include_prerelease || !package.is_prerelease())
            && (self.include_unlisted || package.listed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOptions {
    pub include_prerelease: bool,
    /// Return every newer version instead of only the newest per id
    pub include_all_versions: bool,
}

pub async fn find_packages<R>(
    repository: &R,
    id: &PackageId,
    range: Option<&VersionRange>,
    filter: QueryFilter,
) -> RepositoryResult<Vec<Package>>
where
    R: PackageRepository + ?Sized,
{
    let mut packages: Vec<Package> = repository
        .get_packages_by_id(id)
        .await?
        .into_iter()
        .filter(|package| filter.accepts(package))
        .filter(|package| range.map_or(true, |r| r.satisfies(&package.version)))
        .collect();
    packages.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(packages)
}

pub async fn find_package<R>(
    repository: &R,
    id: &PackageId,
    version: Option<&Version>,
    constraints: Option<&dyn ConstraintProvider>,
    filter: QueryFilter,
) -> RepositoryResult<Option<Package>>
where
    R: PackageRepository + ?Sized,
{
    if let Some(version) = version {
        return repository.get_package(id, version).await;
    }

    if !filter.include_unlisted && constraints.is_none() {
        if let Some(lookup) = repository.latest_lookup() {
            if let Some(package) = lookup
                .find_latest_package(id, filter.include_prerelease, false)
                .await?
            {
                return Ok(Some(package));
            }
        }
    }

    let constraint = constraints.and_then(|provider| provider.constraint(id));
    let packages = find_packages(repository, id, constraint.as_ref(), filter).await?;
    Ok(packages.into_iter().next())
}

pub async fn find_latest<R>(
    repository: &R,
    id: &PackageId,
    include_prerelease: bool,
    include_unlisted: bool,
) -> RepositoryResult<Option<Package>>
where
    R: PackageRepository + ?Sized,
{
    let filter = QueryFilter {
        include_prerelease,
        include_unlisted,
    };
    Ok(repository
        .get_packages_by_id(id)
        .await?
        .into_iter()
        .filter(|package| filter.accepts(package))
        .max_by(|a, b| a.version.cmp(&b.version)))
}

/// Packages whose id, title, description or tags match `search_term`, by id then version
pub async fn search<R>(
    repository: &R,
    search_term: &str,
    filter: QueryFilter,
) -> RepositoryResult<Vec<Package>>
where
    R: PackageRepository + ?Sized,
{
    let mut packages: Vec<Package> = repository
        .get_all_packages()
        .await?
        .into_iter()
        .filter(|package| filter.accepts(package) && package.matches_search(search_term))
        .collect();
    sort_packages(&mut packages);
    Ok(packages)
}

pub async fn get_updates<R>(
    repository: &R,
    installed: &[PackageIdentity],
    options: UpdateOptions,
    constraints: Option<&[Option<VersionRange>]>,
) -> RepositoryResult<Vec<Package>>
where
    R: PackageRepository + ?Sized,
{
    if installed.is_empty() {
        return Ok(Vec::new());
    }
    check_constraint_count(installed, constraints)?;

    let filter = QueryFilter {
        include_prerelease: options.include_prerelease,
        include_unlisted: false,
    };

    let mut candidates: HashMap<PackageId, Vec<Package>> = HashMap::new();
    let mut updates = Vec::new();
    for (index, identity) in installed.iter().enumerate() {
        if !candidates.contains_key(&identity.id) {
            let packages = repository.get_packages_by_id(&identity.id).await?;
            candidates.insert(identity.id.clone(), packages);
        }
        let constraint = constraints.and_then(|c| c[index].as_ref());

        let newer = candidates
            .get(&identity.id)
            .into_iter()
            .flatten()
            .filter(|candidate| filter.accepts(candidate))
            .filter(|candidate| candidate.version > identity.version)
            .filter(|candidate| constraint.map_or(true, |r| r.satisfies(&candidate.version)));
        updates.extend(newer.cloned());
    }

    if options.include_all_versions {
        Ok(updates)
    } else {
        Ok(collapse_by_id(updates))
    }
}

/// Reject a constraint list whose length differs from the installed list
pub fn check_constraint_count(
    installed: &[PackageIdentity],
    constraints: Option<&[Option<VersionRange>]>,
) -> RepositoryResult<()> {
    match constraints {
        Some(constraints) if constraints.len() != installed.len() => {
            Err(SprigError::ArgumentMismatch {
                message: format!(
                    "{} version constraints given for {} installed packages",
                    constraints.len(),
                    installed.len()
                ),
            })
        },
        _ => Ok(()),
    }
}

/// Keep only the newest version per id, in order of first appearance
pub fn collapse_by_id(packages: impl IntoIterator<Item = Package>) -> Vec<Package> {
    let mut newest: IndexMap<PackageId, Package> = IndexMap::new();
    for package in packages {
        match newest.get_mut(&package.id) {
            Some(existing) if existing.version >= package.version => {},
            Some(existing) => *existing = package,
            None => {
                newest.insert(package.id.clone(), package);
            },
        }
    }
    newest.into_values().collect()
}

/// Drop repeated identities, keeping the first copy seen
pub fn distinct_packages(packages: impl IntoIterator<Item = Package>) -> Vec<Package> {
    let mut seen: IndexMap<PackageIdentity, Package> = IndexMap::new();
    for package in packages {
        seen.entry(package.identity()).or_insert(package);
    }
    seen.into_values().collect()
}

/// Sort by id (ignoring case) then ascending version
pub fn sort_packages(packages: &mut [Package]) {
    packages.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.version.cmp(&b.version)));
}
