use std::{
    cell::RefCell,
    collections::HashMap,
    hash::Hash,
};

use futures::{
    future::{LocalBoxFuture, Shared},
    FutureExt,
};

use super::GltfLoadResult;

pub(crate) type SharedLoad<V> = Shared<LocalBoxFuture<'static, GltfLoadResult<V>>>;

/// Memoizes asynchronous loads so concurrent requests for one key share a
/// single in-flight computation and all observe the same outcome.
///
/// Failed loads stay cached as well: a session never retries a dependency.
pub(crate) struct SingleFlight<K, V> {
    entries: RefCell<HashMap<K, SharedLoad<V>>>,
    invocations: RefCell<HashMap<K, usize>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            invocations: RefCell::new(HashMap::new()),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> SingleFlight<K, V> {
    /// Future for `key`, calling `load` only if nothing was requested yet.
    ///
    /// `load` must only build the future; it runs while the cache is borrowed.
    pub(crate) fn get_or_load(
        &self,
        key: K,
        load: impl FnOnce() -> LocalBoxFuture<'static, GltfLoadResult<V>>,
    ) -> SharedLoad<V> {
        let existing = self.entries.borrow().get(&key).cloned();
        if let Some(future) = existing {
            return future;
        }
        *self.invocations.borrow_mut().entry(key.clone()).or_insert(0) += 1;
        let future = load().shared();
        self.entries.borrow_mut().insert(key, future.clone());
        future
    }

    /// How many times a load was started for `key`.
    pub(crate) fn invocations(&self, key: &K) -> usize {
        self.invocations.borrow().get(key).copied().unwrap_or(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, rc::Rc};

    use futures::future::join;

    use super::*;
    use crate::loader::gltf::GltfLoaderError;

    #[test]
    fn test_concurrent_requests_share_one_load() {
        let cache: SingleFlight<u32, u32> = SingleFlight::default();
        let runs = Rc::new(Cell::new(0));
        let request = |runs: Rc<Cell<u32>>| {
            cache.get_or_load(7, move || {
                async move {
                    runs.set(runs.get() + 1);
                    Ok(42)
                }
                .boxed_local()
            })
        };
        let (a, b) = pollster::block_on(join(request(runs.clone()), request(runs.clone())));
        assert_eq!((a.unwrap(), b.unwrap()), (42, 42));
        assert_eq!(runs.get(), 1);
        assert_eq!(cache.invocations(&7), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failure_is_shared() {
        let cache: SingleFlight<u32, u32> = SingleFlight::default();
        let fail = || async { Err(GltfLoaderError::MissingAsset) }.boxed_local();
        let first = pollster::block_on(cache.get_or_load(1, fail));
        let second = pollster::block_on(cache.get_or_load(1, || async { Ok(1) }.boxed_local()));
        assert!(matches!(first, Err(GltfLoaderError::MissingAsset)));
        assert!(matches!(second, Err(GltfLoaderError::MissingAsset)));
        assert_eq!(cache.invocations(&1), 1);
    }
}
