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

//! The top-level façade: [`CacheAccessCoordinator`], built through
//! [`CacheAccessCoordinatorBuilder`].
//!
//! # Example
//!
//! ```
//! use iceoryx2_bb_cache_access::coordinator::CacheAccessCoordinatorBuilder;
//! use iceoryx2_bb_cache_access::lock_mode::LockMode;
//! use iceoryx2_bb_cache_access::testing::{TestFileLockManager, TestInitializationAction};
//! use std::sync::Arc;
//!
//! let coordinator = CacheAccessCoordinatorBuilder::new()
//!     .lock_file("/tmp/demo.lock")
//!     .lock_mode(LockMode::None)
//!     .lock_manager(Arc::new(TestFileLockManager::new()))
//!     .initialization_action(Arc::new(TestInitializationAction::already_initialized()))
//!     .create()
//!     .expect("failed to create coordinator");
//!
//! coordinator.open().expect("failed to open");
//! let value = coordinator.use_cache("demo", || 40 + 2).expect("use_cache failed");
//! assert_eq!(value, 42);
//! coordinator.close();
//! ```

use crate::cache_parameters::{CacheId, CacheParameters};
use crate::cache_registry::{CacheRegistry, InvalidCacheReuseError, MultiProcessSafeCache};
use crate::enum_gen;
use crate::file_access::FileAccess;
use crate::file_lock::FileLockManager;
use crate::indexed_cache::IndexedCache;
use crate::initialization_action::InitializationAction;
use crate::lock_mode::LockMode;
use crate::lock_state_machine::{LockStateMachine, LongRunningGuard};
pub use crate::lock_state_machine::{OpenError, UseCacheError};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

/// Raised by a second call to [`CacheAccessCoordinator::open`].
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub struct AlreadyOpenError;

impl core::fmt::Display for AlreadyOpenError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "the coordinator is already open")
    }
}

impl core::error::Error for AlreadyOpenError {}

/// Raised by [`CacheAccessCoordinator::use_cache`] when the coordinator was configured with
/// [`LockMode::Shared`]. A shared lock only ever guards readers; it can never be used to run a
/// caller's arbitrary (and possibly mutating) cache operation.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub struct SharedModeDoesNotSupportWriteError;

impl core::fmt::Display for SharedModeDoesNotSupportWriteError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "shared mode does not permit cache operations")
    }
}

impl core::error::Error for SharedModeDoesNotSupportWriteError {}

enum_gen! {
    /// Raised by [`CacheAccessCoordinatorBuilder::create`] when a mandatory field was never set.
    CacheAccessCoordinatorCreationError
  entry:
    MissingLockFile,
    MissingLockManager,
    MissingInitializationAction
}

impl core::fmt::Display for CacheAccessCoordinatorCreationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for CacheAccessCoordinatorCreationError {}

/// State shared between a [`CacheAccessCoordinator`] and the decorated caches it hands out - held
/// behind an `Arc` by the coordinator and only ever referenced weakly by
/// [`crate::cache_decorator::CrossProcessCacheAccess`]/[`crate::cache_decorator::AsyncCacheAccess`]
/// to avoid a reference cycle.
pub(crate) struct CoordinatorShared {
    pub(crate) lock_state_machine: LockStateMachine,
    pub(crate) registry: Mutex<CacheRegistry>,
    cache_directory: Option<PathBuf>,
}

impl Debug for CoordinatorShared {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CoordinatorShared")
            .field("lock_state_machine", &self.lock_state_machine)
            .finish_non_exhaustive()
    }
}

/// RAII guard that restores ownership (reacquiring the lock if it was closed on contention) when
/// dropped - including when dropped while unwinding out of a panicking `action`. Per SPEC_FULL.md
/// §7, a panicking action must leave the coordinator exactly as a normally-returning one would;
/// modeled on the `MutexGuard`/`FileLockWriteGuard` release-on-drop idiom this codebase uses for
/// every other scoped lock handle.
struct ExitLongRunningGuard<'a> {
    shared: &'a Arc<CoordinatorShared>,
    weak: Weak<CoordinatorShared>,
    guard: Option<LongRunningGuard>,
}

impl ExitLongRunningGuard<'_> {
    fn finish(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.shared.lock_state_machine.exit_long_running(guard, &self.weak);
        }
    }
}

impl Drop for ExitLongRunningGuard<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Runs `action` as a long-running operation on `shared`: if the calling thread currently owns
/// `shared`'s lock, ownership (and, on contention, the lock itself) is relinquished for the
/// duration of `action` and restored before returning. Otherwise - no enclosing `use_cache` frame
/// on this thread, including the reentrant case - this is a pure passthrough.
///
/// Exists as a free function, rather than only as a method on [`CacheAccessCoordinator`], so that
/// [`crate::cache_decorator::AsyncCacheAccess`] can drive it from a `Weak`-upgraded `Arc` without
/// needing a `CacheAccessCoordinator` handle of its own.
pub(crate) fn long_running_operation_on_shared<R>(
    shared: &Arc<CoordinatorShared>,
    description: &str,
    action: impl FnOnce() -> R,
) -> R {
    crate::trace!(from description, "entering long_running_operation");
    let weak = Arc::downgrade(shared);
    let guard = shared.lock_state_machine.enter_long_running();
    let mut exit_guard = ExitLongRunningGuard {
        shared,
        weak,
        guard: Some(guard),
    };
    let result = action();
    exit_guard.finish();
    crate::trace!(from description, "exited long_running_operation");
    result
}

/// RAII guard that calls [`LockStateMachine::exit_use_cache`] on drop - including when dropped
/// while unwinding out of a panicking `action` - so a panic inside [`CacheAccessCoordinator::use_cache`]
/// can never leave the owner thread recorded forever. See [`ExitLongRunningGuard`].
struct ExitUseCacheGuard<'a> {
    shared: &'a Arc<CoordinatorShared>,
}

impl Drop for ExitUseCacheGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock_state_machine.exit_use_cache();
    }
}

/// The top-level façade described in spec §4.1: mediates access to one inter-process file lock
/// and the typed caches opened through it.
pub struct CacheAccessCoordinator {
    shared: Arc<CoordinatorShared>,
}

impl Debug for CacheAccessCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheAccessCoordinator")
            .field("lock_mode", &self.shared.lock_state_machine.mode())
            .field("lock_file", &self.shared.lock_state_machine.lock_file())
            .finish()
    }
}

impl CacheAccessCoordinator {
    /// Implements spec §4.1 `open`. See §4.2 for the initialization handshake run when the
    /// coordinator is configured with [`LockMode::Shared`] or [`LockMode::Exclusive`].
    pub fn open(&self) -> Result<(), OpenError> {
        let weak = Arc::downgrade(&self.shared);
        let result = self.shared.lock_state_machine.open(&weak);
        match &result {
            Ok(()) => crate::info!(from self, "opened"),
            Err(e) => crate::debug!(from self, "open failed: {e:?}"),
        }
        result
    }

    /// Implements spec §4.1 `close`. Idempotent; never fails, since the underlying
    /// [`crate::file_lock::FileLock::close`] contract cannot fail either.
    pub fn close(&self) {
        crate::info!(from self, "closing");
        self.shared.lock_state_machine.close();
    }

    /// Implements spec §4.1 `use_cache` / spec §4.3 enter-use-cache/exit-use-cache. Reentrant on
    /// the thread that currently owns the lock; blocks if another thread owns it.
    ///
    /// `action` runs behind an [`ExitUseCacheGuard`] so ownership is released even if `action`
    /// panics - per SPEC_FULL.md §7, a panicking action must leave ownership/lock invariants as
    /// if it had returned normally, not leak the owner thread forever.
    pub fn use_cache<R>(
        &self,
        description: &str,
        action: impl FnOnce() -> R,
    ) -> Result<R, UseCacheError> {
        let weak = Arc::downgrade(&self.shared);
        crate::fail!(from description, when self.shared.lock_state_machine.enter_use_cache(&weak),
            "use_cache({description}) could not acquire cache ownership");
        let _exit_guard = ExitUseCacheGuard {
            shared: &self.shared,
        };
        let result = action();
        Ok(result)
    }

    /// Implements spec §4.1 `long_running_operation` / spec §4.3
    /// enter-long-running/exit-long-running.
    ///
    /// Per the Open Question in spec.md §9 (recorded in DESIGN.md): when called at the top level
    /// - with no enclosing `use_cache` frame on this thread - this is a no-op with respect to the
    /// lock and ownership, and [`Self::file_access`] will fail with
    /// [`crate::file_access::FileAccessRequiresLockError`] for the duration of `action`.
    pub fn long_running_operation<R>(&self, description: &str, action: impl FnOnce() -> R) -> R {
        long_running_operation_on_shared(&self.shared, description, action)
    }

    /// Implements spec §4.1 `new_cache` / spec §4.4 `get_or_build`. Construction never acquires
    /// the lock; the lock is acquired the first time a `use_cache` frame touches the resulting
    /// cache.
    pub fn new_cache<K, V>(
        &self,
        params: CacheParameters<K, V>,
        factory: impl FnOnce() -> Arc<dyn IndexedCache<K, V>>,
    ) -> Result<MultiProcessSafeCache<K, V>, InvalidCacheReuseError>
    where
        K: 'static,
        V: 'static,
    {
        let weak = Arc::downgrade(&self.shared);
        let mut registry = self.shared.registry.lock().unwrap();
        registry.get_or_build(&params, move || {
            let id = CacheId::generate();
            let cross_process_cache_access = crate::cache_decorator::CrossProcessCacheAccess {
                inner: weak.clone(),
            };
            let async_cache_access = crate::cache_decorator::AsyncCacheAccess { inner: weak };
            let persistent = factory();
            let persistent = match &params.decorator {
                Some(decorator) => decorator.decorate(
                    id,
                    &params.name,
                    persistent,
                    cross_process_cache_access.clone(),
                    async_cache_access.clone(),
                ),
                None => persistent,
            };
            MultiProcessSafeCache::new(id, persistent, cross_process_cache_access, async_cache_access)
        })
    }

    /// Implements spec §4.1 `fileAccess` / spec §4.5.
    pub fn file_access(&self) -> FileAccess {
        FileAccess::new(Arc::clone(&self.shared))
    }

    /// Returns the contention handler to register with whatever [`FileLockManager`] the caller's
    /// platform integration uses - see spec §4.3 `whenContended fired`. Idempotent and
    /// thread-safe; invoking it when no lock is held, or after [`Self::close`], is a no-op.
    pub fn when_contended(&self) -> impl Fn() + Send + Sync + 'static {
        let weak = Arc::downgrade(&self.shared);
        move || {
            if let Some(shared) = weak.upgrade() {
                shared.lock_state_machine.on_contention();
            }
        }
    }

    /// The directory the builder was configured with, if any - a convenience for callers
    /// building their `new_cache` factory closures; the coordinator itself never reads it.
    pub fn cache_directory(&self) -> Option<&Path> {
        self.shared.cache_directory.as_deref()
    }
}

/// Builds a [`CacheAccessCoordinator`], modeled on the chained-setter-plus-terminal-`create`
/// shape of this codebase's other builders (e.g. `MutexBuilder`, `FileLockBuilder`).
pub struct CacheAccessCoordinatorBuilder {
    lock_file: Option<PathBuf>,
    display_name: String,
    lock_mode: LockMode,
    cache_directory: Option<PathBuf>,
    lock_manager: Option<Arc<dyn FileLockManager>>,
    initialization_action: Option<Arc<dyn InitializationAction>>,
}

impl Default for CacheAccessCoordinatorBuilder {
    fn default() -> Self {
        Self {
            lock_file: None,
            display_name: "cache-access-coordinator".to_string(),
            lock_mode: LockMode::Exclusive,
            cache_directory: None,
            lock_manager: None,
            initialization_action: None,
        }
    }
}

impl CacheAccessCoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock file the [`FileLockManager`] will be asked to lock. Mandatory.
    pub fn lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_file = Some(path.into());
        self
    }

    /// Used only for diagnostics passed through to [`FileLockManager::lock`].
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Defaults to [`LockMode::Exclusive`].
    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    /// Recorded purely for [`CacheAccessCoordinator::cache_directory`]; the coordinator itself
    /// never touches the filesystem beyond the lock file.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(path.into());
        self
    }

    /// Mandatory.
    pub fn lock_manager(mut self, lock_manager: Arc<dyn FileLockManager>) -> Self {
        self.lock_manager = Some(lock_manager);
        self
    }

    /// Mandatory.
    pub fn initialization_action(mut self, action: Arc<dyn InitializationAction>) -> Self {
        self.initialization_action = Some(action);
        self
    }

    pub fn create(self) -> Result<CacheAccessCoordinator, CacheAccessCoordinatorCreationError> {
        let lock_file = self
            .lock_file
            .ok_or(CacheAccessCoordinatorCreationError::MissingLockFile)?;
        let lock_manager = self
            .lock_manager
            .ok_or(CacheAccessCoordinatorCreationError::MissingLockManager)?;
        let initialization_action = self
            .initialization_action
            .ok_or(CacheAccessCoordinatorCreationError::MissingInitializationAction)?;

        let shared = Arc::new(CoordinatorShared {
            lock_state_machine: LockStateMachine::new(
                self.lock_mode,
                lock_file,
                self.display_name,
                lock_manager,
                initialization_action,
            ),
            registry: Mutex::new(CacheRegistry::new()),
            cache_directory: self.cache_directory,
        });

        Ok(CacheAccessCoordinator { shared })
    }
}
