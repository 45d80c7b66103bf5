// Copyright (c) 2023 Contributors to the Eclipse Foundation
//
// See the NOTICE file(s) distributed with this work for additional
// information regarding copyright ownership.
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-coordinator registry of opened caches, keyed by name, and the typed handle -
//! [`MultiProcessSafeCache`] - that [`crate::coordinator::CacheAccessCoordinator::new_cache`]
//! hands back for each one.

use crate::cache_decorator::{AsyncCacheAccess, CrossProcessCacheAccess};
use crate::cache_parameters::{CacheId, CacheIdentity, CacheParameters};
use crate::indexed_cache::{CacheIoError, IndexedCache};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Raised by [`crate::coordinator::CacheAccessCoordinator::new_cache`] when a cache of that name
/// was already opened with parameters that are not compatible with the ones just requested - see
/// [`CacheIdentity::is_compatible_with`].
#[derive(Debug, Clone)]
pub struct InvalidCacheReuseError {
    pub cache_name: String,
}

impl InvalidCacheReuseError {
    fn new(cache_name: &str) -> Self {
        Self {
            cache_name: cache_name.to_string(),
        }
    }
}

impl core::fmt::Display for InvalidCacheReuseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "cache '{}' was already opened with incompatible parameters",
            self.cache_name
        )
    }
}

impl core::error::Error for InvalidCacheReuseError {}

/// The handle returned by [`crate::coordinator::CacheAccessCoordinator::new_cache`]: the
/// persistent cache a caller's factory produced, wrapped with whatever
/// [`crate::cache_decorator::CacheDecorator`] was configured, plus the two weak-referencing
/// capabilities a decorator needs to reach back into the coordinator.
pub struct MultiProcessSafeCache<K, V> {
    id: CacheId,
    inner: Arc<dyn IndexedCache<K, V>>,
    cross_process_cache_access: CrossProcessCacheAccess,
    async_cache_access: AsyncCacheAccess,
}

impl<K, V> Clone for MultiProcessSafeCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
            cross_process_cache_access: self.cross_process_cache_access.clone(),
            async_cache_access: self.async_cache_access.clone(),
        }
    }
}

impl<K, V> Debug for MultiProcessSafeCache<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MultiProcessSafeCache")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<K, V> MultiProcessSafeCache<K, V> {
    pub(crate) fn new(
        id: CacheId,
        inner: Arc<dyn IndexedCache<K, V>>,
        cross_process_cache_access: CrossProcessCacheAccess,
        async_cache_access: AsyncCacheAccess,
    ) -> Self {
        Self {
            id,
            inner,
            cross_process_cache_access,
            async_cache_access,
        }
    }

    /// Distinguishes this cache from any cache of the same name opened in a prior registry
    /// generation - see [`crate::cache_decorator::CacheDecorator::decorate`].
    pub fn id(&self) -> CacheId {
        self.id
    }

    pub fn get(&self, key: &K) -> Result<Option<V>, CacheIoError> {
        self.inner.get(key)
    }

    pub fn put(&self, key: K, value: V) -> Result<(), CacheIoError> {
        self.inner.put(key, value)
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>, CacheIoError> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> Result<usize, CacheIoError> {
        self.inner.len()
    }

    pub fn is_empty(&self) -> Result<bool, CacheIoError> {
        self.inner.is_empty()
    }

    pub fn cross_process_cache_access(&self) -> &CrossProcessCacheAccess {
        &self.cross_process_cache_access
    }

    pub fn async_cache_access(&self) -> &AsyncCacheAccess {
        &self.async_cache_access
    }
}

struct CacheEntry {
    identity: CacheIdentity,
    built: Arc<dyn Any + Send + Sync>,
}

/// Keyed by cache name. One instance lives behind a `Mutex` inside
/// [`crate::coordinator::CoordinatorShared`].
pub(crate) struct CacheRegistry {
    entries: HashMap<String, CacheEntry>,
}

impl CacheRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Implements spec §4.4 `get_or_build`: returns the existing cache for `params.name` if its
    /// stored identity is compatible with `params`, builds and registers a fresh one via `build`
    /// if the name is unseen, or fails with [`InvalidCacheReuseError`] on a mismatch.
    pub(crate) fn get_or_build<K, V>(
        &mut self,
        params: &CacheParameters<K, V>,
        build: impl FnOnce() -> MultiProcessSafeCache<K, V>,
    ) -> Result<MultiProcessSafeCache<K, V>, InvalidCacheReuseError>
    where
        K: 'static,
        V: 'static,
    {
        let identity = CacheIdentity::of(params);

        if let Some(entry) = self.entries.get(&params.name) {
            if !entry.identity.is_compatible_with(&identity) {
                return Err(InvalidCacheReuseError::new(&params.name));
            }
            let cache = Arc::clone(&entry.built)
                .downcast::<MultiProcessSafeCache<K, V>>()
                .unwrap_or_else(|_| {
                    crate::fatal_panic!(
                        "cache '{}' matched its registered identity but not its stored type",
                        params.name
                    )
                });
            return Ok((*cache).clone());
        }

        let cache = build();
        self.entries.insert(
            params.name.clone(),
            CacheEntry {
                identity,
                built: Arc::new(cache.clone()),
            },
        );
        Ok(cache)
    }
}
