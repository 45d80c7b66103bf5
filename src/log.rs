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

//! Logging macros used throughout this crate, backed by [`tracing`].
//!
//! Mirrors the `trace!`/`debug!`/`info!`/`warn!`/`error!`/`fatal_panic!` family from
//! `iceoryx2-bb-log`, but emits through `tracing` instead of a custom logger backend, since this
//! crate has no need for the multi-backend logger facade the wider workspace carries.

#[doc(hidden)]
pub fn __internal_print_log_msg(level: LogLevel, origin: std::fmt::Arguments, msg: std::fmt::Arguments) {
    match level {
        LogLevel::Trace => tracing::trace!(origin = %origin, "{}", msg),
        LogLevel::Debug => tracing::debug!(origin = %origin, "{}", msg),
        LogLevel::Info => tracing::info!(origin = %origin, "{}", msg),
        LogLevel::Warn => tracing::warn!(origin = %origin, "{}", msg),
        LogLevel::Error => tracing::error!(origin = %origin, "{}", msg),
        LogLevel::Fatal => tracing::error!(origin = %origin, "{}", msg),
    }
}

#[doc(hidden)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Logs a trace message, optionally tagged with an origin object or a failing call.
#[macro_export(local_inner_macros)]
macro_rules! trace {
    ($($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Trace, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Trace, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
}

/// Logs a debug message, optionally tagged with an origin object or a failing call.
#[macro_export(local_inner_macros)]
macro_rules! debug {
    ($($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Debug, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Debug, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
}

/// Logs an info message, optionally tagged with an origin object.
#[macro_export(local_inner_macros)]
macro_rules! info {
    ($($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Info, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Info, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
}

/// Logs a warn message, optionally tagged with an origin object.
#[macro_export(local_inner_macros)]
macro_rules! warn {
    ($($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Warn, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Warn, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
}

/// Logs an error message, optionally tagged with an origin object.
#[macro_export(local_inner_macros)]
macro_rules! error {
    ($($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Error, std::format_args!(""), std::format_args!($($e),*))
    };
    (from $o:expr, $($e:expr),*) => {
        $crate::log::__internal_print_log_msg($crate::log::LogLevel::Error, std::format_args!("{:?}", $o), std::format_args!($($e),*))
    };
}

/// Logs a fatal message and panics. Used for internal invariant violations only.
#[macro_export(local_inner_macros)]
macro_rules! fatal_panic {
    ($($e:expr),*) => {
        {
            $crate::log::__internal_print_log_msg($crate::log::LogLevel::Fatal, std::format_args!(""), std::format_args!($($e),*));
            std::panic!($($e),*);
        }
    };
    (from $o:expr, $($e:expr),*) => {
        {
            $crate::log::__internal_print_log_msg($crate::log::LogLevel::Fatal, std::format_args!("{:?}", $o), std::format_args!($($e),*));
            std::panic!("From: {:?} ::: {}", $o, std::format_args!($($e),*));
        }
    };
}

/// Combines error handling with logging: fails and converts the error with [`From`].
#[macro_export(local_inner_macros)]
macro_rules! fail {
    (from $origin:expr, with $error_value:expr, $($message:expr),*) => {
        {
            $crate::debug!(from $origin, $($message),*);
            return Err($error_value);
        }
    };
    (from $origin:expr, when $call:expr, with $error_value:expr, $($message:expr),*) => {
        {
            let result = $call;
            match result.is_err() {
                true => {
                    $crate::debug!(from $origin, $($message),*);
                    return Err($error_value);
                }
                false => result.ok().unwrap(),
            }
        }
    };
    (from $origin:expr, when $call:expr, to $error:ty, $($message:expr),*) => {
        {
            let result = $call;
            match result.is_err() {
                true => {
                    $crate::debug!(from $origin, $($message),*);
                    let error = <$error>::from(result.err().unwrap());
                    return Err(error);
                }
                false => result.ok().unwrap(),
            }
        }
    };
    (from $origin:expr, when $call:expr, $($message:expr),*) => {
        {
            let result = $call;
            match result.is_err() {
                true => {
                    $crate::debug!(from $origin, $($message),*);
                    result?
                }
                false => result.ok().unwrap(),
            }
        }
    };
}
