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

//! The external collaborator that implements the typed, file-backed key-value store.
//!
//! The coordinator never constructs an [`IndexedCache`] directly - it is produced on demand by
//! the factory closure a caller passes to
//! [`CacheAccessCoordinator::new_cache`](crate::coordinator::CacheAccessCoordinator::new_cache).
//! The on-disk index format itself is out of scope for this crate.

use crate::enum_gen;
use std::fmt::Debug;

enum_gen! {
    /// Failure raised by an [`IndexedCache`] operation.
    CacheIoError

  entry:
    Io,
    Corrupted,
    KeyNotFound
}

impl core::fmt::Display for CacheIoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CacheIoError::{self:?}")
    }
}

impl core::error::Error for CacheIoError {}

/// A typed, file-backed key-value store. Every call is made while the caller holds the
/// coordinator's lock; this trait carries no locking of its own.
pub trait IndexedCache<K, V>: Debug + Send + Sync {
    fn get(&self, key: &K) -> Result<Option<V>, CacheIoError>;
    fn put(&self, key: K, value: V) -> Result<(), CacheIoError>;
    fn remove(&self, key: &K) -> Result<Option<V>, CacheIoError>;
    fn len(&self) -> Result<usize, CacheIoError>;
    fn is_empty(&self) -> Result<bool, CacheIoError> {
        Ok(self.len()? == 0)
    }
}
