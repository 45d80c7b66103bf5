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

//! Narrow serialization capability used by [`crate::cache_parameters::CacheParameters`].
//!
//! This is deliberately opaque: the crate does not specify a wire format, only the capability
//! and the default implementation every caller gets for free.

use crate::enum_gen;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

enum_gen! {
    /// Failure raised by a [`Serializer`].
    SerializationError

  entry:
    Encode,
    Decode
}

impl core::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SerializationError::{self:?}")
    }
}

impl core::error::Error for SerializationError {}

/// Converts a value of `T` to and from bytes.
///
/// `is_default()` exists purely to support the compatibility check in
/// [`crate::cache_parameters::CacheParameters`]: a caller-supplied serializer and an omitted one
/// (which resolves to [`DefaultSerializer`]) are considered compatible.
pub trait Serializer<T>: Debug + Send + Sync {
    fn serialize(&self, value: &T) -> Result<Vec<u8>, SerializationError>;
    fn deserialize(&self, bytes: &[u8]) -> Result<T, SerializationError>;

    /// Identity used by the cache-compatibility check. Two serializer instances are considered
    /// the same serializer iff this value and [`core::any::TypeId`] of the concrete type match;
    /// callers normally don't need to override this beyond `false`.
    fn is_default(&self) -> bool {
        false
    }
}

/// The crate-provided [`Serializer`] for any `T: Serialize + DeserializeOwned`, backed by
/// `serde_json`.
pub struct DefaultSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> DefaultSerializer<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            _marker: PhantomData,
        })
    }
}

impl<T> Debug for DefaultSerializer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DefaultSerializer").finish()
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Serializer<T> for DefaultSerializer<T> {
    fn serialize(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(value).map_err(|_| SerializationError::Encode)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        serde_json::from_slice(bytes).map_err(|_| SerializationError::Decode)
    }

    fn is_default(&self) -> bool {
        true
    }
}
