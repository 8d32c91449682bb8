//! Resource fetching for buffers and images referenced by URI.
//!
//! The loader never touches the file-system or network itself. Everything
//! outside the document and its binary chunk is requested through a
//! [`ResourceFetcher`], so an embedder can serve resources from memory,
//! a directory, or anything else.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
    sync::Arc,
};

use bytes::Bytes;
use futures::future::LocalBoxFuture;

#[cfg(feature = "fs")]
mod fs;
mod memory;

#[cfg(feature = "fs")]
pub use fs::DirectoryFetcher;
pub use memory::MemoryFetcher;

#[derive(Debug, Clone)]
pub enum FetchError {
    NotFound(String),
    Io(String, Arc<io::Error>),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound(uri) => write!(f, "Resource {} not found", uri),
            FetchError::Io(uri, error) => write!(f, "Failed to read {}: {}", uri, error),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FetchError::NotFound(_) => None,
            FetchError::Io(_, error) => Some(error.as_ref()),
        }
    }
}

pub trait ResourceFetcher {
    /// Fetch the resource at `uri`, already resolved against the document location.
    fn fetch(&self, uri: &str) -> LocalBoxFuture<'_, Result<Bytes, FetchError>>;
}
