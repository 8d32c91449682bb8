use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use futures::{future::LocalBoxFuture, FutureExt};
use log::debug;

use super::{FetchError, ResourceFetcher};

/// Serves resources from a directory on the local file-system.
///
/// Only relative paths and `file://` URLs are accepted; other URLs are
/// reported as not found.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, uri: &str) -> Option<PathBuf> {
        if let Some(path) = uri.strip_prefix("file://") {
            return Some(PathBuf::from(path));
        }
        if uri.contains("://") || uri.starts_with("//") {
            return None;
        }
        Some(self.root.join(uri.trim_start_matches('/')))
    }
}

impl ResourceFetcher for DirectoryFetcher {
    fn fetch(&self, uri: &str) -> LocalBoxFuture<'_, Result<Bytes, FetchError>> {
        let uri = uri.to_string();
        let path = self.path_for(&uri);
        async move {
            let Some(path) = path else {
                return Err(FetchError::NotFound(uri));
            };
            debug!("Reading {}", path.display());
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Bytes::from(data)),
                Err(error) if error.kind() == ErrorKind::NotFound => Err(FetchError::NotFound(uri)),
                Err(error) => Err(FetchError::Io(uri, Arc::new(error))),
            }
        }
        .boxed_local()
    }
}
