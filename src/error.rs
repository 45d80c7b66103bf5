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

//! A coarse, caller-facing classification over every failure this crate can raise.
//!
//! Most callers should match on the specific error enum returned by the method they called
//! ([`crate::coordinator::CacheAccessCoordinator::open`] returns
//! [`crate::lock_state_machine::OpenError`], etc.); [`CacheAccessError`] exists for callers that
//! want to log or report a failure generically without threading every specific error type
//! through their own API.

use crate::cache_registry::InvalidCacheReuseError;
use crate::enum_gen;
use crate::file_access::FileAccessError;
use crate::lock_state_machine::{OpenError, UseCacheError};

enum_gen! {
    CacheAccessError
  generalization:
    Open <= OpenError,
    UseCache <= UseCacheError,
    InvalidCacheReuse <= InvalidCacheReuseError,
    FileAccess <= FileAccessError
}

impl core::fmt::Display for CacheAccessError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl core::error::Error for CacheAccessError {}
