//! Creating repositories from source strings.

use camino::Utf8PathBuf;
use std::fmt;
use std::sync::Arc;
use url::Url;

use sprig_core::SprigError;

use crate::local::LocalRepository;
use crate::repository::PackageRepository;
use crate::RepositoryResult;

/// Turns a source location into a repository
pub trait RepositoryFactory: Send + Sync + fmt::Debug {
    fn create_repository(&self, source: &str) -> RepositoryResult<Arc<dyn PackageRepository>>;
}

/// Factory for filesystem sources
///
/// Accepts plain directory paths and `file://` URLs. Remote sources are
/// rejected with [`SprigError::UnsupportedSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRepositoryFactory;

impl RepositoryFactory for DefaultRepositoryFactory {
    fn create_repository(&self, source: &str) -> RepositoryResult<Arc<dyn PackageRepository>> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SprigError::UnsupportedSource {
                location: source.to_string(),
            });
        }

        let url = match Url::parse(source) {
            // single-letter schemes are Windows drive letters
            Ok(url) if url.scheme().len() > 1 => url,
            _ => return Ok(Arc::new(LocalRepository::new(source))),
        };

        if url.scheme() != "file" {
            return Err(SprigError::UnsupportedSource {
                location: source.to_string(),
            });
        }

        let path = url
            .to_file_path()
            .ok()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .ok_or_else(|| SprigError::UnsupportedSource {
                location: source.to_string(),
            })?;
        Ok(Arc::new(LocalRepository::new(path)))
    }
}
