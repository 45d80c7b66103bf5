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

//! Escape hatch described in spec §4.5: direct access to the raw lock file for external
//! collaborators - typically an [`crate::indexed_cache::IndexedCache`] implementation - that
//! need to read or write bytes next to, or instead of, the indexed store.
//!
//! Every method requires the calling thread to currently own the coordinator's lock; none of
//! them acquire or release it.

pub use crate::lock_state_machine::FileAccessRequiresLockError;

use crate::enum_gen;
use crate::file_lock::FileOperationError;
use std::sync::Arc;

enum_gen! {
    /// Failure raised by a [`FileAccess`] operation: either the calling thread does not own the
    /// lock, or the owned operation itself failed.
    FileAccessError
  mapping:
    FileAccessRequiresLockError,
    FileOperationError
}

impl core::fmt::Display for FileAccessError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for FileAccessError {}

/// A handle that lets the calling thread - provided it currently owns the coordinator's lock -
/// run raw read/write operations against the lock file.
///
/// Cheap to construct and to discard; it holds a strong reference to the coordinator's shared
/// state only for its own lifetime, not beyond.
pub struct FileAccess {
    shared: Arc<crate::coordinator::CoordinatorShared>,
}

impl FileAccess {
    pub(crate) fn new(shared: Arc<crate::coordinator::CoordinatorShared>) -> Self {
        Self { shared }
    }

    /// Runs `action` inside a write-file region of the underlying lock, per
    /// [`crate::file_lock::FileLock::write_file`].
    pub fn write_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileAccessError> {
        self.run(|lock| lock.write_file(action))
    }

    /// Runs `action` inside an update-file region of the underlying lock, per
    /// [`crate::file_lock::FileLock::update_file`].
    pub fn update_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileAccessError> {
        self.run(|lock| lock.update_file(action))
    }

    /// Runs `action` inside a read-file region of the underlying lock, per
    /// [`crate::file_lock::FileLock::read_file`].
    pub fn read_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileAccessError> {
        self.run(|lock| lock.read_file(action))
    }

    fn run(
        &self,
        f: impl FnOnce(&dyn crate::file_lock::FileLock) -> Result<(), FileOperationError>,
    ) -> Result<(), FileAccessError> {
        match self.shared.lock_state_machine.with_owned_lock(f) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(FileAccessError::from(e)),
            Err(e) => Err(FileAccessError::from(e)),
        }
    }
}

impl core::fmt::Debug for FileAccess {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FileAccess").finish()
    }
}
