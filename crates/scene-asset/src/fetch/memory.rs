use std::{cell::Cell, collections::HashMap};

use bytes::Bytes;
use futures::{future::LocalBoxFuture, FutureExt};

use super::{FetchError, ResourceFetcher};

/// Serves resources from an in-memory path map.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    entries: HashMap<String, Bytes>,
    requests: Cell<usize>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.entries.insert(path.into(), data.into());
    }

    pub fn with(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }

    /// Number of fetches served so far, including misses.
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl ResourceFetcher for MemoryFetcher {
    fn fetch(&self, uri: &str) -> LocalBoxFuture<'_, Result<Bytes, FetchError>> {
        self.requests.set(self.requests.get() + 1);
        let result = self
            .entries
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()));
        async move { result }.boxed_local()
    }
}
