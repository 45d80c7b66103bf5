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

//! Multi-process-safe coordination for a persistent, indexed on-disk cache.
//!
//! A [`coordinator::CacheAccessCoordinator`] mediates access to one inter-process file lock
//! shared by however many processes and threads want to read or write the store it guards. It
//! layers three things on top of that lock:
//!
//! - a [`lock_mode::LockMode`]-driven open/close lifecycle, including the initialization
//!   handshake run the first time any process needs to create the store (see the
//!   [`coordinator`] module docs for the full sequence);
//! - a single-owner-thread, reentrant discipline for `use_cache` frames, so the lock is only
//!   ever actually held by one thread in this process at a time even though many threads may
//!   call into the coordinator concurrently;
//! - a contention-driven release path, so a long-running in-process operation yields the lock
//!   to another process the moment that process signals it wants it, rather than starving it
//!   for the operation's whole duration.
//!
//! A typed [`cache_registry::CacheRegistry`] sits alongside the lock: the first caller to ask
//! for a cache by name builds it through a caller-supplied factory; every later caller gets the
//! same [`cache_registry::MultiProcessSafeCache`] back, provided its [`cache_parameters::CacheParameters`]
//! are compatible with what was already registered.
//!
//! # Example
//!
//! ```
//! use iceoryx2_bb_cache_access::cache_parameters::CacheParameters;
//! use iceoryx2_bb_cache_access::coordinator::CacheAccessCoordinatorBuilder;
//! use iceoryx2_bb_cache_access::lock_mode::LockMode;
//! use iceoryx2_bb_cache_access::testing::{TestFileLockManager, TestIndexedCache, TestInitializationAction};
//! use std::sync::Arc;
//!
//! let coordinator = CacheAccessCoordinatorBuilder::new()
//!     .lock_file("/tmp/demo-cache.lock")
//!     .lock_mode(LockMode::None)
//!     .lock_manager(Arc::new(TestFileLockManager::new()))
//!     .initialization_action(Arc::new(TestInitializationAction::already_initialized()))
//!     .create()
//!     .expect("failed to create coordinator");
//!
//! coordinator.open().expect("failed to open");
//!
//! let cache = coordinator
//!     .new_cache(CacheParameters::<String, u32>::new("counters"), || TestIndexedCache::new())
//!     .expect("failed to open cache");
//!
//! coordinator
//!     .use_cache("seed counters", || cache.put("visits".to_string(), 1))
//!     .expect("use_cache failed")
//!     .expect("put failed");
//!
//! coordinator.close();
//! ```

pub mod log;

pub mod cache_decorator;
pub mod cache_parameters;
pub mod cache_registry;
pub mod coordinator;
pub mod enum_gen;
pub mod error;
pub mod file_access;
pub mod file_lock;
pub mod indexed_cache;
pub mod initialization_action;
pub mod lock_mode;
mod lock_state_machine;
pub mod serializer;

#[doc(hidden)]
pub mod testing;

pub use cache_parameters::CacheId;
pub use coordinator::{CacheAccessCoordinator, CacheAccessCoordinatorBuilder};
pub use error::CacheAccessError;
pub use lock_mode::LockMode;
