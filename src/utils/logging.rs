//! Logging macros gated by a module-level `ENABLE_LOGS` flag.
//!
//! The ticker loop and the audio thread log on every pulse or cue, which is
//! noisy in normal runs. Modules that use these macros declare the flag and
//! flip it while debugging:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::{log_info, log_warn, log_error};
//!
//! log_info!("pulse {}", n);
//! ```

/// `log::info!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// `log::warn!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// `log::error!` when the calling module's `ENABLE_LOGS` is true.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
