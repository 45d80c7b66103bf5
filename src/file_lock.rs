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

//! External collaborator contracts for the inter-process file lock.
//!
//! This crate does not implement the POSIX-level lock protocol itself - see
//! `iceoryx2_bb_posix::file_lock` for that machinery. Here the lock is an abstract
//! collaborator: something that can be acquired in [`LockMode::Shared`] or
//! [`LockMode::Exclusive`], closed, and read from / written to while held.

use crate::enum_gen;
use crate::lock_mode::LockMode;
use std::fmt::Debug;

enum_gen! {
    /// Failure while attempting to acquire a lock through a [`FileLockManager`].
    LockAcquisitionError

  entry:
    Interrupted,
    PermissionDenied,
    LockFileCorrupted,
    Internal
}

impl core::fmt::Display for LockAcquisitionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "LockAcquisitionError::{self:?}")
    }
}

impl core::error::Error for LockAcquisitionError {}

enum_gen! {
    /// Failure while reading from or writing to a file under a held lock.
    FileOperationError

  entry:
    Io,
    Interrupted,
    NotOwner
}

impl core::fmt::Display for FileOperationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "FileOperationError::{self:?}")
    }
}

impl core::error::Error for FileOperationError {}

/// A handle to an inter-process lock held on one file.
///
/// Implementations are provided by the collaborator that owns the platform-specific lock
/// protocol; [`crate::testing::TestFileLock`] provides an in-memory double for tests.
pub trait FileLock: Debug + Send + Sync {
    /// The mode this lock is currently held in.
    fn mode(&self) -> LockMode;

    /// Runs `action` while the lock is held in [`LockMode::Exclusive`], in a region that is
    /// atomic and crash-safe with respect to concurrent readers under [`LockMode::Shared`].
    fn write_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileOperationError>;

    /// Runs `action`, which may both read and write, without the crash-safety guarantees of
    /// [`write_file`](Self::write_file). Requires the lock to be held in
    /// [`LockMode::Exclusive`].
    fn update_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileOperationError>;

    /// Runs `action`, which may only read. Valid under either lock mode.
    fn read_file(
        &self,
        action: &mut dyn FnMut() -> Result<(), FileOperationError>,
    ) -> Result<(), FileOperationError>;

    /// Releases the lock. Consumes the handle so it cannot be used afterwards.
    fn close(self: Box<Self>);
}

/// A callback the platform invokes, on a manager-owned thread, when another process wants the
/// lock currently held by this process.
pub type ContentionCallback = Box<dyn Fn() + Send + Sync>;

/// Creates [`FileLock`] handles and lets callers register for contention notifications.
///
/// Implementations are provided by the collaborator that owns the platform-specific lock
/// protocol; [`crate::testing::TestFileLockManager`] provides an in-memory double for tests.
pub trait FileLockManager: Debug + Send + Sync {
    /// Acquires a lock on `lock_file` in the given `mode`. `display_name` is used only for
    /// diagnostics.
    fn lock(
        &self,
        lock_file: &std::path::Path,
        mode: LockMode,
        display_name: &str,
    ) -> Result<Box<dyn FileLock>, LockAcquisitionError>;

    /// Registers `callback` to be invoked when another process signals contention for `lock`.
    /// At most one callback is registered per lock; registering again replaces the previous
    /// one.
    fn allow_contention(&self, lock: &dyn FileLock, callback: ContentionCallback);
}
