// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::sync::{atomic::AtomicBool, atomic::Ordering};

#[doc(hidden)]
pub use log as _log;

#[macro_export]
macro_rules! info {
    ($msg:literal, $($arg:tt)+) => {
        stim_log::_log::info!(target: concat!("stim.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        stim_log::_log::info!(target: concat!("stim.rust::", module_path!()), $msg);
    };
}

#[macro_export]
macro_rules! warn {
    ($msg:literal, $($arg:tt)+) => {
        stim_log::_log::warn!(target: concat!("stim.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        stim_log::_log::warn!(target: concat!("stim.rust::", module_path!()), $msg);
    };
}

#[macro_export]
macro_rules! debug {
    ($msg:literal, $($arg:tt)+) => {
        stim_log::_log::debug!(target: concat!("stim.rust::", module_path!()), $msg, $($arg)+);
    };
    ($msg:literal) => {
        stim_log::_log::debug!(target: concat!("stim.rust::", module_path!()), $msg);
    };
}

/// Log a diagnostic message at debug level if diagnostics logging is enabled.
#[macro_export]
macro_rules! diagnostic {
    ($msg:literal, $($arg:tt)+) => {
        if stim_log::is_diagnostics_enabled() {
            stim_log::_log::debug!(target: concat!("stim.rust::", module_path!()), $msg, $($arg)+);
        }
    };
    ($msg:literal) => {
        if stim_log::is_diagnostics_enabled() {
            stim_log::_log::debug!(target: concat!("stim.rust::", module_path!()), $msg);
        }
    };
}

/// Prefix of the target of every record emitted through these macros.
pub const TARGET_PREFIX: &str = "stim.rust::";

/// Whether a record with `target` was emitted by the protocol engine.
///
/// Lets an embedding application route engine records to their own sink.
pub fn is_engine_target(target: &str) -> bool {
    target.starts_with(TARGET_PREFIX)
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Initialize the logging.
///
/// Call once at start-up. The library never installs a logger itself; the
/// embedding application picks one for the `log` facade. This only toggles
/// the diagnostics that report waveform expansion sizes.
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_flag() {
        init_logging(true);
        assert!(is_diagnostics_enabled());
        init_logging(false);
        assert!(!is_diagnostics_enabled());
    }

    #[test]
    fn test_engine_target() {
        assert!(is_engine_target(concat!("stim.rust::", module_path!())));
        assert!(is_engine_target("stim.rust::stim_protocol::transfer"));
        assert!(!is_engine_target("stim_protocol::transfer"));
        assert!(!is_engine_target("hyper::client"));
    }
}
