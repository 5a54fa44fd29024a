//! Crate-internal logging facade.
//!
//! Every record goes through [`emit`], which picks a backend at compile time:
//! `tracing` when the `tracing` feature is enabled, otherwise `log` when the
//! `logging` feature is enabled, otherwise nothing (format arguments are still
//! type-checked so a disabled build cannot hide a broken log line).

use std::fmt;

macro_rules! emit {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        { tracing::$level!($($arg)*); }

        #[cfg(all(not(feature = "tracing"), feature = "logging"))]
        { log::$level!($($arg)*); }

        #[cfg(not(any(feature = "tracing", feature = "logging")))]
        { let _ = format_args!($($arg)*); }
    }};
}

#[allow(unused_macros)]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::logging::emit!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::logging::emit!(info, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::logging::emit!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::logging::emit!(error, $($arg)*) };
}

pub(crate) use emit;
pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;

/// Number of leading characters of an encoded certificate that end up in logs.
const ABBREV_CHARS: usize = 24;

/// Log-friendly rendering of an encoded certificate.
///
/// Certificates are several hundred characters of base64; only the head and
/// the total length are printed.
pub(crate) struct Abbrev<'a>(pub(crate) &'a str);

impl fmt::Display for Abbrev<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.char_indices().nth(ABBREV_CHARS) {
            Some((cut, _)) => write!(f, "{}...({} chars)", &self.0[..cut], self.0.chars().count()),
            None => f.write_str(self.0),
        }
    }
}
