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

//! Easy enum generation for error signaling enums.
//!
//! ```
//! use iceoryx2_bb_cache_access::enum_gen;
//!
//! enum_gen! {
//!     /// Some optional documentation
//!     MyErrorEnum
//!
//!   entry:
//!     Failure1,
//!     Failure2
//! }
//! ```
//!
//! `generalization` additionally implements [`From`] for one or more source enums, discarding
//! their value and mapping them onto one coarse variant - used for the crate-wide
//! generalization enums such as [`crate::error::CacheAccessError`].

#[macro_export(local_inner_macros)]
macro_rules! enum_gen {
    { $(#[$documentation:meta])*
      $enum_name:ident
      entry:
        $($entry:ident$(($bla:ident))?),*}
    => {
        $(#[$documentation])*
        #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
        pub enum $enum_name {
            $($entry$(($bla))?),*
        }
    };

    { $(#[$documentation:meta])*
      $enum_name:ident
      mapping:
        $($equivalent:ident),*}
    => {
        $(#[$documentation])*
        #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
        pub enum $enum_name {
            $($equivalent($equivalent)),*
        }

        $(impl From<$equivalent> for $enum_name {
            fn from(v: $equivalent) -> Self {
                $enum_name::$equivalent(v)
            }
        })*
    };

    { $(#[$documentation:meta])*
      $enum_name:ident
      entry:
        $($entry:ident$(($bla:ident))?),*
      mapping:
        $($equivalent:ident),*}
    => {
        $(#[$documentation])*
        #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
        pub enum $enum_name {
            $($entry$(($bla))?),*,
            $($equivalent($equivalent)),*
        }

        $(impl From<$equivalent> for $enum_name {
            fn from(v: $equivalent) -> Self {
                $enum_name::$equivalent(v)
            }
        })*
    };

    { $(#[$documentation:meta])*
      $enum_name:ident
      generalization:
        $($destination:ident <= $($source:ident);*),*}
    => {
        $(#[$documentation])*
        #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
        pub enum $enum_name {
            $($destination),*,
        }

        $($(impl From<$source> for $enum_name {
            fn from(_: $source) -> Self {
                $enum_name::$destination
            }
        })*)*
    };

    { $(#[$documentation:meta])*
      $enum_name:ident
      entry:
        $($entry:ident$(($bla:ident))?),*
      generalization:
        $($destination:ident <= $($source:ident);*),*}
    => {
        $(#[$documentation])*
        #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
        pub enum $enum_name {
            $($entry$(($bla))?),*,
            $($destination),*,
        }

        $($(impl From<$source> for $enum_name {
            fn from(_: $source) -> Self {
                $enum_name::$destination
            }
        })*)*
    };
}
