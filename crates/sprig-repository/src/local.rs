//! Filesystem repository of JSON package manifests.
//!
//! Layout: `<root>/<id>/<version>/<id>.json`, one manifest per package
//! version. The manifest content is authoritative; directory names only
//! narrow the scan for id lookups. Parsed manifests are cached by path and
//! modification time, and malformed manifests are skipped with a warning.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use sprig_core::types::{Package, PackageId, PackageIdentity};
use sprig_core::SprigError;

use crate::query::QueryFilter;
use crate::repository::{LatestPackageLookup, PackageRepository};
use crate::RepositoryResult;

const MANIFEST_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
struct CachedManifest {
    modified: SystemTime,
    package: Package,
}

/// Repository backed by a directory tree of package manifests
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: Utf8PathBuf,
    cache: Arc<DashMap<Utf8PathBuf, CachedManifest>>,
}

impl LocalRepository {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the manifest for `identity` lives
    pub fn manifest_path(&self, identity: &PackageIdentity) -> Utf8PathBuf {
        self.root
            .join(identity.id.as_str())
            .join(identity.version.to_string())
            .join(format!("{}.{}", identity.id, MANIFEST_EXTENSION))
    }

    /// Write a manifest for `package`, replacing any existing one
    pub async fn add_package(&self, package: &Package) -> RepositoryResult<Utf8PathBuf> {
        let path = self.manifest_path(&package.identity());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SprigError::io(format!("Failed to create {}", parent), e))?;
        }

        let json = serde_json::to_string_pretty(package).map_err(|e| SprigError::Manifest {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| SprigError::io(format!("Failed to write {}", path), e))?;

        debug!(package = %package, path = %path, "Added package manifest");
        Ok(path)
    }

    /// Delete the manifest for `identity`; `false` when it was not present
    pub async fn remove_package(&self, identity: &PackageIdentity) -> RepositoryResult<bool> {
        let manifests = self.load_manifests(self.id_directories(&identity.id).await?).await?;
        let Some((path, _)) = manifests
            .into_iter()
            .find(|(_, package)| package.identity() == *identity)
        else {
            return Ok(false);
        };

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| SprigError::io(format!("Failed to remove {}", path), e))?;
        self.cache.remove(&path);

        // Drop now-empty version and id directories; non-empty ones stay
        if let Some(version_dir) = path.parent() {
            if tokio::fs::remove_dir(version_dir).await.is_ok() {
                if let Some(id_dir) = version_dir.parent() {
                    let _ = tokio::fs::remove_dir(id_dir).await;
                }
            }
        }

        debug!(package = %identity, "Removed package manifest");
        Ok(true)
    }

    /// Directories under the root whose name matches `id` ignoring case
    async fn id_directories(&self, id: &PackageId) -> RepositoryResult<Vec<Utf8PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SprigError::io(format!("Failed to read {}", self.root), e)),
        };

        let mut directories = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SprigError::io(format!("Failed to read {}", self.root), e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if id == name {
                directories.push(self.root.join(name));
            }
        }
        Ok(directories)
    }

    /// Parse every manifest below `directories`
    async fn load_manifests(&self, directories: Vec<Utf8PathBuf>) -> RepositoryResult<Vec<(Utf8PathBuf, Package)>> {
        let files = tokio::task::spawn_blocking(move || scan_manifest_files(&directories))
            .await
            .map_err(|e| SprigError::source_failure(self.root.as_str(), "Manifest scan task failed", e))?;

        let mut packages = Vec::with_capacity(files.len());
        for (path, modified) in files {
            if let Some(cached) = self.cache.get(&path) {
                if cached.modified == modified {
                    packages.push((path.clone(), cached.package.clone()));
                    continue;
                }
            }

            match read_manifest(&path).await {
                Ok(package) => {
                    self.cache.insert(
                        path.clone(),
                        CachedManifest {
                            modified,
                            package: package.clone(),
                        },
                    );
                    packages.push((path, package));
                },
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping malformed package manifest");
                    self.cache.remove(&path);
                },
            }
        }
        Ok(packages)
    }
}

/// Walk `directories` for manifest files, returning their paths and modification times
fn scan_manifest_files(directories: &[Utf8PathBuf]) -> Vec<(Utf8PathBuf, SystemTime)> {
    let mut files = Vec::new();
    for directory in directories {
        if !directory.is_dir() {
            continue;
        }

        for entry in WalkDir::new(directory).max_depth(3).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(directory = %directory, error = %e, "Skipping unreadable entry");
                    continue;
                },
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
                continue;
            };
            if path.extension() != Some(MANIFEST_EXTENSION) {
                continue;
            }

            let modified = path
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }
    }
    files
}

async fn read_manifest(path: &Utf8Path) -> RepositoryResult<Package> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SprigError::io(format!("Failed to read {}", path), e))?;
    serde_json::from_str(&content).map_err(|e| SprigError::Manifest {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl PackageRepository for LocalRepository {
    fn source(&self) -> &str {
        self.root.as_str()
    }

    async fn get_all_packages(&self) -> RepositoryResult<Vec<Package>> {
        let manifests = self.load_manifests(vec![self.root.clone()]).await?;
        Ok(manifests.into_iter().map(|(_, package)| package).collect())
    }

    async fn get_packages_by_id(&self, id: &PackageId) -> RepositoryResult<Vec<Package>> {
        let manifests = self.load_manifests(self.id_directories(id).await?).await?;
        Ok(manifests
            .into_iter()
            .map(|(_, package)| package)
            .filter(|package| &package.id == id)
            .collect())
    }

    fn latest_lookup(&self) -> Option<&dyn LatestPackageLookup> {
        Some(self)
    }
}

#[async_trait]
impl LatestPackageLookup for LocalRepository {
    async fn find_latest_package(
        &self,
        id: &PackageId,
        include_prerelease: bool,
        include_unlisted: bool,
    ) -> RepositoryResult<Option<Package>> {
        let filter = QueryFilter {
            include_prerelease,
            include_unlisted,
        };
        Ok(self
            .get_packages_by_id(id)
            .await?
            .into_iter()
            .filter(|package| filter.accepts(package))
            .max_by(|a, b| a.version.cmp(&b.version)))
    }
}
