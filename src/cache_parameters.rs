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

//! Parameters a caller provides when asking the [`CacheRegistry`](crate::cache_registry::CacheRegistry)
//! for a named cache, and the compatibility check performed across re-opens.

use crate::cache_decorator::CacheDecorator;
use crate::serializer::Serializer;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(0);

/// A per-process-unique, monotonically increasing identifier handed to
/// [`CacheDecorator::decorate`] so a decorator can tell caches apart without relying on name
/// uniqueness across registry generations.
///
/// Modeled on `iceoryx2_bb_elementary::unique_id::UniqueId`.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct CacheId(u64);

impl CacheId {
    pub(crate) fn generate() -> Self {
        Self(NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Describes the cache a caller wants to open: its name, key and value types, optional
/// serializers, and an optional decorator.
///
/// Two parameter sets are compatible (see [`CacheParameters::is_compatible_with`]) iff `name`,
/// key type and value type match exactly, the decorators are identity-equal, and the
/// serializers are either equal or one side is omitted while the other is the default
/// serializer.
pub struct CacheParameters<K, V> {
    pub name: String,
    pub key_serializer: Option<Arc<dyn Serializer<K>>>,
    pub value_serializer: Option<Arc<dyn Serializer<V>>>,
    pub decorator: Option<Arc<dyn CacheDecorator<K, V>>>,
}

impl<K, V> Clone for CacheParameters<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            key_serializer: self.key_serializer.clone(),
            value_serializer: self.value_serializer.clone(),
            decorator: self.decorator.clone(),
        }
    }
}

impl<K, V> CacheParameters<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_serializer: None,
            value_serializer: None,
            decorator: None,
        }
    }

    pub fn with_key_serializer(mut self, serializer: Arc<dyn Serializer<K>>) -> Self {
        self.key_serializer = Some(serializer);
        self
    }

    pub fn with_value_serializer(mut self, serializer: Arc<dyn Serializer<V>>) -> Self {
        self.value_serializer = Some(serializer);
        self
    }

    pub fn with_decorator(mut self, decorator: Arc<dyn CacheDecorator<K, V>>) -> Self {
        self.decorator = Some(decorator);
        self
    }
}

/// Type-erased identity of a single opened cache, used by [`crate::cache_registry::CacheRegistry`]
/// to compare an existing entry against a fresh [`CacheParameters`] request without depending on
/// `K`/`V` at the registry's storage layer.
#[derive(Clone)]
pub(crate) struct CacheIdentity {
    pub name: String,
    pub key_type: TypeId,
    pub value_type: TypeId,
    pub decorator_ptr: Option<usize>,
    pub key_serializer_is_default: Option<bool>,
    pub value_serializer_is_default: Option<bool>,
    pub key_serializer_ptr: Option<usize>,
    pub value_serializer_ptr: Option<usize>,
}

impl CacheIdentity {
    pub fn of<K: 'static, V: 'static>(params: &CacheParameters<K, V>) -> Self {
        Self {
            name: params.name.clone(),
            key_type: TypeId::of::<K>(),
            value_type: TypeId::of::<V>(),
            decorator_ptr: params
                .decorator
                .as_ref()
                .map(|d| Arc::as_ptr(d) as *const () as usize),
            key_serializer_is_default: params.key_serializer.as_ref().map(|s| s.is_default()),
            value_serializer_is_default: params.value_serializer.as_ref().map(|s| s.is_default()),
            key_serializer_ptr: params
                .key_serializer
                .as_ref()
                .map(|s| Arc::as_ptr(s) as *const () as usize),
            value_serializer_ptr: params
                .value_serializer
                .as_ref()
                .map(|s| Arc::as_ptr(s) as *const () as usize),
        }
    }

    /// Implements the compatibility rule from the data model: name, key type and value type
    /// match exactly; decorators are identity-equal; each serializer side is either equal or
    /// one side omitted while the other is the default.
    pub fn is_compatible_with(&self, other: &CacheIdentity) -> bool {
        self.name == other.name
            && self.key_type == other.key_type
            && self.value_type == other.value_type
            && self.decorator_ptr == other.decorator_ptr
            && serializer_compatible(self.key_serializer_is_default, self.key_serializer_ptr, other.key_serializer_is_default, other.key_serializer_ptr)
            && serializer_compatible(self.value_serializer_is_default, self.value_serializer_ptr, other.value_serializer_is_default, other.value_serializer_ptr)
    }
}

fn serializer_compatible(
    is_default_a: Option<bool>,
    ptr_a: Option<usize>,
    is_default_b: Option<bool>,
    ptr_b: Option<usize>,
) -> bool {
    match (ptr_a, ptr_b) {
        (None, None) => true,
        (Some(_), None) => is_default_a.unwrap_or(false),
        (None, Some(_)) => is_default_b.unwrap_or(false),
        (Some(a), Some(b)) => a == b,
    }
}
