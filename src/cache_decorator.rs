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

//! Optional external collaborator that wraps a freshly built cache in additional behavior
//! (eviction, metrics, write-through, ...) without the decorator holding a strong reference
//! back to the coordinator.
//!
//! The coordinator and a decorated cache would otherwise form a reference cycle: the
//! coordinator owns the cache through the registry, and the cache wants to call back into the
//! coordinator to run operations under the lock. [`CrossProcessCacheAccess`] and
//! [`AsyncCacheAccess`] break the cycle by holding only a [`std::sync::Weak`] view over the
//! coordinator's shared state.

use crate::cache_parameters::CacheId;
use crate::file_access::{FileAccess, FileAccessError, FileAccessRequiresLockError};
use crate::indexed_cache::IndexedCache;
use std::fmt::Debug;
use std::sync::{Arc, Weak};

/// A weak-referencing view that lets a decorated cache run an operation under the coordinator's
/// file lock, without the decorator owning the coordinator.
#[derive(Clone)]
pub struct CrossProcessCacheAccess {
    pub(crate) inner: Weak<crate::coordinator::CoordinatorShared>,
}

impl Debug for CrossProcessCacheAccess {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CrossProcessCacheAccess").finish()
    }
}

impl CrossProcessCacheAccess {
    /// Runs `action` with access to the lock file, failing with
    /// [`FileAccessError`] if the coordinator has since been dropped, no lock is currently held
    /// by this thread, or the operation `action` performs through [`FileAccess`] itself fails.
    pub fn with_file_lock<R>(
        &self,
        action: impl FnOnce(&FileAccess) -> Result<R, FileAccessError>,
    ) -> Result<R, FileAccessError> {
        let shared = self
            .inner
            .upgrade()
            .ok_or(FileAccessError::from(FileAccessRequiresLockError::NoLockHeld))?;
        action(&FileAccess::new(shared))
    }
}

/// A weak-referencing view that lets a decorated cache schedule a long-running operation on the
/// owning coordinator (releasing ownership and, on contention, the lock, for its duration).
#[derive(Clone)]
pub struct AsyncCacheAccess {
    pub(crate) inner: Weak<crate::coordinator::CoordinatorShared>,
}

impl Debug for AsyncCacheAccess {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncCacheAccess").finish()
    }
}

impl AsyncCacheAccess {
    /// Runs `action` as a long-running operation on the coordinator this cache belongs to. See
    /// [`crate::coordinator::CacheAccessCoordinator::long_running_operation`].
    pub fn run<R>(&self, description: &str, action: impl FnOnce() -> R) -> Option<R> {
        let shared = self.inner.upgrade()?;
        Some(crate::coordinator::long_running_operation_on_shared(
            &shared,
            description,
            action,
        ))
    }
}

/// Wraps a freshly constructed [`IndexedCache`] with additional behavior.
///
/// Implementations are provided by the collaborator that wants to add cross-cutting behavior to
/// every cache opened through one coordinator; `cache_id` lets a decorator distinguish caches
/// across registry generations without relying on name uniqueness.
pub trait CacheDecorator<K, V>: Debug + Send + Sync {
    fn decorate(
        &self,
        cache_id: CacheId,
        cache_name: &str,
        persistent_cache: Arc<dyn IndexedCache<K, V>>,
        cross_process_cache_access: CrossProcessCacheAccess,
        async_cache_access: AsyncCacheAccess,
    ) -> Arc<dyn IndexedCache<K, V>>;
}
