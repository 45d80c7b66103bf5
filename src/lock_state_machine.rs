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

//! The heart of the coordinator: the inter-process lock lifecycle, the thread-ownership
//! discipline layered on top of it, and the contention-driven release/reacquire dance.
//!
//! Every mutable field that participates in the state machine - the lock slot, the owner
//! thread, the reentrancy depth and the pending-contention flag - lives behind a single
//! [`Mutex`], with a [`Condvar`] used both to let a waiting thread block until it becomes owner
//! and to let a thread reacquiring the lock after a long-running operation block until nobody
//! else is mid-acquisition. The contention callback handed to the [`FileLockManager`] never
//! itself blocks on this mutex for long: it only flips a flag or closes an already-unowned lock.

use crate::coordinator::{AlreadyOpenError, CoordinatorShared, SharedModeDoesNotSupportWriteError};
use crate::enum_gen;
use crate::fatal_panic;
use crate::file_lock::{
    ContentionCallback, FileLock, FileLockManager, FileOperationError, LockAcquisitionError,
};
use crate::initialization_action::{InitializationAction, InitializationError};
use crate::lock_mode::LockMode;
use std::cell::Cell;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, ThreadId};

enum_gen! {
    /// Failure during the initialization handshake of spec §4.2: acquiring the lock(s),
    /// checking whether the store needs initialization, and running [`InitializationAction::initialize`]
    /// inside a write-file region.
    InitializationHandshakeError
  entry:
    WriteFileFailed
  mapping:
    LockAcquisitionError,
    InitializationError
}

impl core::fmt::Display for InitializationHandshakeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for InitializationHandshakeError {}

enum_gen! {
    /// Failure raised by [`crate::coordinator::CacheAccessCoordinator::open`].
    OpenError
  mapping:
    AlreadyOpenError,
    InitializationHandshakeError
}

impl core::fmt::Display for OpenError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for OpenError {}

enum_gen! {
    /// Failure raised by [`crate::coordinator::CacheAccessCoordinator::use_cache`].
    UseCacheError
  entry:
    NotOpen
  mapping:
    SharedModeDoesNotSupportWriteError,
    InitializationHandshakeError
}

impl core::fmt::Display for UseCacheError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for UseCacheError {}

enum_gen! {
    /// Raised when a [`crate::file_access::FileAccess`] operation is attempted without the
    /// calling thread currently holding the coordinator's lock.
    FileAccessRequiresLockError
  entry:
    NoLockHeld,
    NotOwner
}

impl core::fmt::Display for FileAccessRequiresLockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for FileAccessRequiresLockError {}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Lifecycle {
    Closed,
    Open,
}

struct Inner {
    lifecycle: Lifecycle,
    current_lock: Option<Box<dyn FileLock>>,
    owner: Option<ThreadId>,
    depth: u32,
    contention_pending: bool,
    acquiring: bool,
}

/// Ownership state saved across a [`crate::coordinator::CacheAccessCoordinator::long_running_operation`]
/// call. `NoOp` is returned for the top-level case (no enclosing `use_cache` frame on this
/// thread) and for reentrant long-running operations, both of which leave the lock and ownership
/// untouched.
pub(crate) enum LongRunningGuard {
    NoOp,
    Relinquished { depth: u32 },
}

/// Manages the lifecycle state, the current inter-process lock, the owner thread and the
/// reentrancy depth for one [`CacheAccessCoordinator`](crate::coordinator::CacheAccessCoordinator).
pub(crate) struct LockStateMachine {
    mode: LockMode,
    lock_file: PathBuf,
    display_name: String,
    lock_manager: Arc<dyn FileLockManager>,
    init_action: Arc<dyn InitializationAction>,
    state: Mutex<Inner>,
    owner_released: Condvar,
}

impl Debug for LockStateMachine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LockStateMachine")
            .field("mode", &self.mode)
            .field("lock_file", &self.lock_file)
            .finish_non_exhaustive()
    }
}

impl LockStateMachine {
    pub(crate) fn new(
        mode: LockMode,
        lock_file: PathBuf,
        display_name: String,
        lock_manager: Arc<dyn FileLockManager>,
        init_action: Arc<dyn InitializationAction>,
    ) -> Self {
        Self {
            mode,
            lock_file,
            display_name,
            lock_manager,
            init_action,
            state: Mutex::new(Inner {
                lifecycle: Lifecycle::Closed,
                current_lock: None,
                owner: None,
                depth: 0,
                contention_pending: false,
                acquiring: false,
            }),
            owner_released: Condvar::new(),
        }
    }

    pub(crate) fn mode(&self) -> LockMode {
        self.mode
    }

    pub(crate) fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Implements spec §4.1 `open`: transitions `Closed -> Open`, acquiring a lock up front
    /// unless configured with [`LockMode::None`].
    pub(crate) fn open(&self, shared: &Weak<CoordinatorShared>) -> Result<(), OpenError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.lifecycle == Lifecycle::Open {
                return Err(OpenError::from(AlreadyOpenError));
            }
            state.lifecycle = Lifecycle::Open;
            if self.mode == LockMode::None {
                return Ok(());
            }
        }

        match self.acquire_and_register(self.mode, shared) {
            Ok(lock) => {
                let mut state = self.state.lock().unwrap();
                state.current_lock = Some(lock);
                self.owner_released.notify_all();
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock().unwrap();
                state.lifecycle = Lifecycle::Closed;
                self.owner_released.notify_all();
                Err(OpenError::from(e))
            }
        }
    }

    /// Implements spec §4.1 `close`: idempotent, closes any held lock, transitions to `Closed`.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.lifecycle = Lifecycle::Closed;
        let lock = state.current_lock.take();
        state.owner = None;
        state.depth = 0;
        state.contention_pending = false;
        self.owner_released.notify_all();
        drop(state);
        if let Some(lock) = lock {
            lock.close();
        }
    }

    /// Implements spec §4.3 `enter-use-cache`.
    pub(crate) fn enter_use_cache(
        &self,
        shared: &Weak<CoordinatorShared>,
    ) -> Result<(), UseCacheError> {
        if self.mode == LockMode::Shared {
            return Err(UseCacheError::from(SharedModeDoesNotSupportWriteError));
        }

        let this_thread = thread::current().id();
        let mut state = self.state.lock().unwrap();
        loop {
            if state.lifecycle == Lifecycle::Closed {
                return Err(UseCacheError::NotOpen);
            }
            if state.owner == Some(this_thread) {
                state.depth += 1;
                return Ok(());
            }
            if state.owner.is_some() {
                state = self.owner_released.wait(state).unwrap();
                continue;
            }
            if state.current_lock.is_some() {
                state.owner = Some(this_thread);
                state.depth = 1;
                return Ok(());
            }
            if state.acquiring {
                state = self.owner_released.wait(state).unwrap();
                continue;
            }

            state.acquiring = true;
            drop(state);
            let result = self.acquire_and_register(LockMode::Exclusive, shared);
            state = self.state.lock().unwrap();
            state.acquiring = false;
            self.owner_released.notify_all();
            match result {
                Ok(lock) => {
                    state.current_lock = Some(lock);
                    continue;
                }
                Err(e) => return Err(UseCacheError::from(e)),
            }
        }
    }

    /// Implements spec §4.3 `exit-use-cache`. The lock itself is never released here; it stays
    /// held until [`close`](Self::close) or until the next contention-honoring release point.
    pub(crate) fn exit_use_cache(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.depth > 0, "exit_use_cache without a matching enter");
        state.depth -= 1;
        let mut lock_to_close = None;
        if state.depth == 0 {
            state.owner = None;
            if state.contention_pending {
                state.contention_pending = false;
                lock_to_close = state.current_lock.take();
            }
        }
        self.owner_released.notify_all();
        drop(state);
        if let Some(lock) = lock_to_close {
            lock.close();
        }
    }

    /// Implements spec §4.3 `enter-long-running`. Returns [`LongRunningGuard::NoOp`] both for a
    /// top-level call (no enclosing `use_cache` frame on this thread) and for a reentrant
    /// long-running operation - in the latter case the owner was already cleared by the
    /// enclosing call, so the same `owner != self` check covers both.
    pub(crate) fn enter_long_running(&self) -> LongRunningGuard {
        let this_thread = thread::current().id();
        let mut state = self.state.lock().unwrap();
        if state.owner != Some(this_thread) {
            return LongRunningGuard::NoOp;
        }

        let depth = state.depth;
        state.owner = None;
        state.depth = 0;
        let mut lock_to_close = None;
        if state.contention_pending {
            state.contention_pending = false;
            lock_to_close = state.current_lock.take();
        }
        self.owner_released.notify_all();
        drop(state);
        if let Some(lock) = lock_to_close {
            lock.close();
        }

        LongRunningGuard::Relinquished { depth }
    }

    /// Implements spec §4.3 `exit-long-running`. Reacquisition is driven by whether the lock is
    /// actually absent at this point, not by whether contention had already arrived when
    /// [`enter_long_running`](Self::enter_long_running) ran - a contention signal that lands
    /// while `action` is still in flight finds `owner == None` already and closes the lock
    /// directly (see [`on_contention`](Self::on_contention)), without going through
    /// `contention_pending`. A reacquire failure would leave the coordinator unable to honor
    /// invariant I1 (owner implies a held lock) for the thread that is about to resume as owner,
    /// so it is treated as a fatal internal error rather than surfaced through
    /// `long_running_operation`'s return value - matching the fact that the latter returns the
    /// caller action's result directly, unwrapped.
    pub(crate) fn exit_long_running(&self, guard: LongRunningGuard, shared: &Weak<CoordinatorShared>) {
        let depth = match guard {
            LongRunningGuard::NoOp => return,
            LongRunningGuard::Relinquished { depth } => depth,
        };

        {
            let mut state = self.state.lock().unwrap();
            loop {
                if state.current_lock.is_some() {
                    break;
                }
                if state.acquiring {
                    state = self.owner_released.wait(state).unwrap();
                    continue;
                }
                state.acquiring = true;
                drop(state);
                let result = self.acquire_and_register(LockMode::Exclusive, shared);
                state = self.state.lock().unwrap();
                state.acquiring = false;
                self.owner_released.notify_all();
                match result {
                    Ok(lock) => {
                        state.current_lock = Some(lock);
                        break;
                    }
                    Err(e) => {
                        drop(state);
                        fatal_panic!(
                            "failed to reacquire the file lock after a long-running operation: {e:?}"
                        );
                    }
                }
            }
        }

        let this_thread = thread::current().id();
        let mut state = self.state.lock().unwrap();
        while state.owner.is_some() {
            state = self.owner_released.wait(state).unwrap();
        }
        state.owner = Some(this_thread);
        state.depth = depth;
        self.owner_released.notify_all();
    }

    /// Implements spec §4.3 `whenContended fired`.
    pub(crate) fn on_contention(&self) {
        let mut state = self.state.lock().unwrap();
        if state.current_lock.is_none() {
            // No lock held (or coordinator already closed): a no-op per spec.
            return;
        }
        if state.owner.is_none() {
            let lock = state.current_lock.take();
            drop(state);
            if let Some(lock) = lock {
                lock.close();
            }
        } else {
            state.contention_pending = true;
        }
    }

    /// Runs `f` with the currently held lock, but only while `f` is invoked on the owner thread.
    pub(crate) fn with_owned_lock<R>(
        &self,
        f: impl FnOnce(&dyn FileLock) -> R,
    ) -> Result<R, FileAccessRequiresLockError> {
        let this_thread = thread::current().id();
        let state = self.state.lock().unwrap();
        if state.owner != Some(this_thread) {
            return Err(FileAccessRequiresLockError::NotOwner);
        }
        match &state.current_lock {
            Some(lock) => Ok(f(lock.as_ref())),
            None => Err(FileAccessRequiresLockError::NoLockHeld),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_lock_held(&self) -> bool {
        self.state.lock().unwrap().current_lock.is_some()
    }

    #[cfg(test)]
    pub(crate) fn has_owner(&self) -> bool {
        self.state.lock().unwrap().owner.is_some()
    }

    fn acquire_and_register(
        &self,
        requested_mode: LockMode,
        shared: &Weak<CoordinatorShared>,
    ) -> Result<Box<dyn FileLock>, InitializationHandshakeError> {
        let lock = self
            .lock_manager
            .lock(&self.lock_file, requested_mode, &self.display_name)?;
        self.register_contention(lock.as_ref(), shared);
        self.handshake(lock, shared)
    }

    fn register_contention(&self, lock: &dyn FileLock, shared: &Weak<CoordinatorShared>) {
        let weak = shared.clone();
        let callback: ContentionCallback = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.lock_state_machine.on_contention();
            }
        });
        self.lock_manager.allow_contention(lock, callback);
    }

    /// Implements spec §4.2, steps 2-5.
    fn handshake(
        &self,
        lock: Box<dyn FileLock>,
        shared: &Weak<CoordinatorShared>,
    ) -> Result<Box<dyn FileLock>, InitializationHandshakeError> {
        let needs_init = match self.init_action.requires_initialization(lock.as_ref()) {
            Ok(v) => v,
            Err(e) => {
                lock.close();
                return Err(InitializationHandshakeError::from(e));
            }
        };
        if !needs_init {
            return Ok(lock);
        }

        match lock.mode() {
            LockMode::Shared => self.handshake_upgrade_and_downgrade(lock, shared),
            LockMode::Exclusive => {
                self.run_initialize_under_write_lock(lock.as_ref())?;
                Ok(lock)
            }
            LockMode::None => {
                fatal_panic!("handshake invoked with a lock that reports LockMode::None")
            }
        }
    }

    fn handshake_upgrade_and_downgrade(
        &self,
        shared_lock: Box<dyn FileLock>,
        shared: &Weak<CoordinatorShared>,
    ) -> Result<Box<dyn FileLock>, InitializationHandshakeError> {
        shared_lock.close();

        let exclusive_lock = self
            .lock_manager
            .lock(&self.lock_file, LockMode::Exclusive, &self.display_name)?;
        self.register_contention(exclusive_lock.as_ref(), shared);

        let still_needs_init = match self
            .init_action
            .requires_initialization(exclusive_lock.as_ref())
        {
            Ok(v) => v,
            Err(e) => {
                exclusive_lock.close();
                return Err(InitializationHandshakeError::from(e));
            }
        };

        if still_needs_init {
            if let Err(e) = self.run_initialize_under_write_lock(exclusive_lock.as_ref()) {
                exclusive_lock.close();
                return Err(e);
            }
        }
        exclusive_lock.close();

        let downgraded = self
            .lock_manager
            .lock(&self.lock_file, LockMode::Shared, &self.display_name)?;
        self.register_contention(downgraded.as_ref(), shared);

        // Re-check per spec §4.2 step 4. Expected false (initialization just completed); a stale
        // `true` would indicate another writer raced us, which the FileLockManager contract does
        // not allow, so we don't loop back into the handshake for it.
        if let Err(e) = self.init_action.requires_initialization(downgraded.as_ref()) {
            downgraded.close();
            return Err(InitializationHandshakeError::from(e));
        }

        Ok(downgraded)
    }

    fn run_initialize_under_write_lock(
        &self,
        lock: &dyn FileLock,
    ) -> Result<(), InitializationHandshakeError> {
        let init_action = &self.init_action;
        let failure: Cell<Option<InitializationError>> = Cell::new(None);
        let mut call_initialize = || -> Result<(), FileOperationError> {
            match init_action.initialize(lock) {
                Ok(()) => Ok(()),
                Err(e) => {
                    failure.set(Some(e));
                    Err(FileOperationError::Io)
                }
            }
        };

        match lock.write_file(&mut call_initialize) {
            Ok(()) => Ok(()),
            Err(_) => match failure.take() {
                Some(e) => Err(InitializationHandshakeError::from(e)),
                None => Err(InitializationHandshakeError::WriteFileFailed),
            },
        }
    }
}
