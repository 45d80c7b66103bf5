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

//! In-memory test doubles for every external collaborator this crate defines, plus
//! [`assert_that`](crate::assert_that), modeled on `iceoryx2_pal_testing::assert`.
//!
//! Not part of the crate's intended public API surface - exported only so integration tests in
//! this crate (and, should the need arise, downstream crates writing their own tests against
//! this one) don't each have to hand-roll the same fakes.

use crate::file_lock::{ContentionCallback, FileLock, FileLockManager, FileOperationError, LockAcquisitionError};
use crate::indexed_cache::{CacheIoError, IndexedCache};
use crate::initialization_action::{InitializationAction, InitializationError};
use crate::lock_mode::LockMode;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex};

/// Panics with a colored, file-and-line-tagged message on failure - the same role
/// `iceoryx2_pal_testing::assert_that!` plays in the wider workspace, trimmed to the predicates
/// this crate's tests actually use.
#[macro_export(local_inner_macros)]
macro_rules! assert_that {
    ($lhs:expr, eq $rhs:expr) => {
        match (&($lhs), &($rhs)) {
            (lhs, rhs) => {
                if !(*lhs == *rhs) {
                    std::panic!(
                        "\n  assertion failed at {}:{}\n  left:  {:?}\n  right: {:?}\n",
                        std::file!(), std::line!(), lhs, rhs
                    );
                }
            }
        }
    };
    ($lhs:expr, ne $rhs:expr) => {
        match (&($lhs), &($rhs)) {
            (lhs, rhs) => {
                if *lhs == *rhs {
                    std::panic!(
                        "\n  assertion failed at {}:{}\n  left:  {:?}\n  right: {:?}\n  expected them to differ\n",
                        std::file!(), std::line!(), lhs, rhs
                    );
                }
            }
        }
    };
    ($value:expr, is_some) => {
        if ($value).is_none() {
            std::panic!("\n  assertion failed at {}:{}\n  expected Some, got None\n", std::file!(), std::line!());
        }
    };
    ($value:expr, is_none) => {
        if ($value).is_some() {
            std::panic!("\n  assertion failed at {}:{}\n  expected None, got Some\n", std::file!(), std::line!());
        }
    };
    ($value:expr, is_ok) => {
        if let Err(e) = &($value) {
            std::panic!("\n  assertion failed at {}:{}\n  expected Ok, got Err({:?})\n", std::file!(), std::line!(), e);
        }
    };
    ($value:expr, is_err) => {
        if ($value).is_ok() {
            std::panic!("\n  assertion failed at {}:{}\n  expected Err, got Ok\n", std::file!(), std::line!());
        }
    };
    ($value:expr, len $len:expr) => {
        if ($value).len() != ($len) {
            std::panic!(
                "\n  assertion failed at {}:{}\n  expected len {}, got {}\n",
                std::file!(), std::line!(), $len, ($value).len()
            );
        }
    };
}

/// Shared, reference-counted in-memory lock state so [`TestFileLock`] handles can release back
/// into the [`TestFileLockManager`] that produced them.
struct SharedLockState {
    state: Mutex<LockState>,
    released: Condvar,
}

struct LockState {
    mode: Option<LockMode>,
    shared_holders: u32,
    contention_callbacks: Vec<ContentionCallback>,
    history: Vec<LockMode>,
    close_count: u32,
}

/// An in-memory [`FileLockManager`] double: enforces the usual shared/exclusive compatibility
/// rule and fires whatever contention callback is currently registered when an incompatible
/// request has to wait.
#[derive(Debug)]
pub struct TestFileLockManager {
    shared: Arc<SharedLockState>,
}

impl Default for TestFileLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFileLockManager {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedLockState {
                state: Mutex::new(LockState {
                    mode: None,
                    shared_holders: 0,
                    contention_callbacks: Vec::new(),
                    history: Vec::new(),
                    close_count: 0,
                }),
                released: Condvar::new(),
            }),
        }
    }

    /// True iff a lock is currently held by anyone, in any mode.
    pub fn is_locked(&self) -> bool {
        self.shared.state.lock().unwrap().mode.is_some()
    }

    /// The mode of every lock successfully acquired through this manager, in order.
    pub fn lock_history(&self) -> Vec<LockMode> {
        self.shared.state.lock().unwrap().history.clone()
    }

    /// How many times a [`TestFileLock`] produced by this manager has been closed.
    pub fn close_count(&self) -> u32 {
        self.shared.state.lock().unwrap().close_count
    }
}

impl Debug for SharedLockState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedLockState").finish_non_exhaustive()
    }
}

impl FileLockManager for TestFileLockManager {
    fn lock(
        &self,
        _lock_file: &std::path::Path,
        mode: LockMode,
        _display_name: &str,
    ) -> Result<Box<dyn FileLock>, LockAcquisitionError> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            let compatible = matches!(
                (state.mode, mode),
                (None, _) | (Some(LockMode::Shared), LockMode::Shared)
            );
            if compatible {
                state.mode = Some(mode);
                if mode == LockMode::Shared {
                    state.shared_holders += 1;
                }
                state.history.push(mode);
                return Ok(Box::new(TestFileLock {
                    shared: Arc::clone(&self.shared),
                    mode,
                }));
            }

            let callbacks: Vec<ContentionCallback> = state.contention_callbacks.drain(..).collect();
            drop(state);
            for callback in &callbacks {
                callback();
            }
            state = self.shared.state.lock().unwrap();
            state = self.shared.released.wait(state).unwrap();
        }
    }

    fn allow_contention(&self, _lock: &dyn FileLock, callback: ContentionCallback) {
        self.shared.state.lock().unwrap().contention_callbacks.push(callback);
    }
}

struct TestFileLock {
    shared: Arc<SharedLockState>,
    mode: LockMode,
}

impl Debug for TestFileLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TestFileLock").field("mode", &self.mode).finish()
    }
}

impl FileLock for TestFileLock {
    fn mode(&self) -> LockMode {
        self.mode
    }

    fn write_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileOperationError> {
        action()
    }

    fn update_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileOperationError> {
        action()
    }

    fn read_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileOperationError> {
        action()
    }

    fn close(self: Box<Self>) {
        let mut state = self.shared.state.lock().unwrap();
        match self.mode {
            LockMode::Shared => {
                state.shared_holders = state.shared_holders.saturating_sub(1);
                if state.shared_holders == 0 {
                    state.mode = None;
                }
            }
            LockMode::Exclusive | LockMode::None => {
                state.mode = None;
            }
        }
        state.close_count += 1;
        drop(state);
        self.shared.released.notify_all();
    }
}

/// An [`InitializationAction`] double that tracks whether the store has been initialized yet,
/// so `requires_initialization` genuinely flips to `false` once `initialize` has run - matching
/// the real handshake of spec §4.2, where the store is re-checked after initializing it.
#[derive(Debug)]
pub struct TestInitializationAction {
    needs_init: std::sync::atomic::AtomicBool,
    initialize_error: Option<InitializationError>,
    initialize_calls: Mutex<u32>,
    requires_initialization_calls: Mutex<u32>,
}

impl TestInitializationAction {
    /// `requires_initialization` always answers `false`; `initialize` is never expected to run.
    pub fn already_initialized() -> Self {
        Self {
            needs_init: std::sync::atomic::AtomicBool::new(false),
            initialize_error: None,
            initialize_calls: Mutex::new(0),
            requires_initialization_calls: Mutex::new(0),
        }
    }

    /// `requires_initialization` answers `true` until `initialize` has run successfully at least
    /// once, then answers `false` from then on.
    pub fn needs_initialization() -> Self {
        Self {
            needs_init: std::sync::atomic::AtomicBool::new(true),
            initialize_error: None,
            initialize_calls: Mutex::new(0),
            requires_initialization_calls: Mutex::new(0),
        }
    }

    /// `requires_initialization` answers `true`; `initialize` always fails with `error`, so the
    /// store never becomes initialized.
    pub fn failing_initialization(error: InitializationError) -> Self {
        Self {
            needs_init: std::sync::atomic::AtomicBool::new(true),
            initialize_error: Some(error),
            initialize_calls: Mutex::new(0),
            requires_initialization_calls: Mutex::new(0),
        }
    }

    pub fn initialize_call_count(&self) -> u32 {
        *self.initialize_calls.lock().unwrap()
    }

    pub fn requires_initialization_call_count(&self) -> u32 {
        *self.requires_initialization_calls.lock().unwrap()
    }
}

impl InitializationAction for TestInitializationAction {
    fn requires_initialization(&self, _lock: &dyn FileLock) -> Result<bool, InitializationError> {
        *self.requires_initialization_calls.lock().unwrap() += 1;
        Ok(self.needs_init.load(std::sync::atomic::Ordering::SeqCst))
    }

    fn initialize(&self, _lock: &dyn FileLock) -> Result<(), InitializationError> {
        *self.initialize_calls.lock().unwrap() += 1;
        match self.initialize_error {
            Some(e) => Err(e),
            None => {
                self.needs_init.store(false, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

/// An [`IndexedCache`] double backed by a `HashMap`, guarded by its own `Mutex` since it must be
/// `Sync` but is not itself protected by the coordinator's lock against concurrent readers from
/// other processes - only against concurrent in-process callers outside a `use_cache` frame.
#[derive(Debug)]
pub struct TestIndexedCache<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for TestIndexedCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> TestIndexedCache<K, V> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl<K, V> IndexedCache<K, V> for TestIndexedCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Debug + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<V>, CacheIoError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: K, value: V) -> Result<(), CacheIoError> {
        self.entries.lock().unwrap().insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<Option<V>, CacheIoError> {
        Ok(self.entries.lock().unwrap().remove(key))
    }

    fn len(&self) -> Result<usize, CacheIoError> {
        Ok(self.entries.lock().unwrap().len())
    }
}
