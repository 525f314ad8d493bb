//! Operational error reporting.
//!
//! Per-notification failures inside the reconcilers and malformed payloads
//! from the native channels are never fatal. They are reported here and
//! dropped, leaving the last known good state in place.

use std::fmt::Display;

use tracing::{debug, error, warn};

/// Extension trait for skipping recoverable failures.
pub trait ResultExt<T, E> {
    /// Logs the error at warning level and converts the result to an `Option`.
    ///
    /// Used wherever a failure must be skipped rather than propagated.
    fn ok_or_warn(self, context: &str) -> Option<T>
    where
        E: Display;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn ok_or_warn(self, context: &str) -> Option<T>
    where
        E: Display,
    {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                ErrorReporter::warn(&e, context);
                None
            }
        }
    }
}

/// Centralized error reporting and logging.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Reports a failure that is expected during normal operation.
    pub fn debug(error: &dyn Display, context: &str) {
        debug!(context = context, error = %error, "Recoverable failure");
    }

    /// Reports a skipped notification or dropped payload.
    pub fn warn(error: &dyn Display, context: &str) {
        warn!(context = context, error = %error, "Skipped after failure");
    }

    /// Reports a terminal failure for the current adapter instance.
    pub fn error(error: &dyn Display, context: &str) {
        error!(context = context, error = %error, "Operation failed");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
    };

    use crate::error::operational::ResultExt;

    #[derive(Debug)]
    struct TestError;

    impl Display for TestError {
        fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
            write!(f, "Test error")
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_ok_or_warn() {
        let ok: Result<i32, TestError> = Ok(3);
        assert_eq!(ok.ok_or_warn("test"), Some(3));

        let err: Result<i32, TestError> = Err(TestError);
        assert_eq!(err.ok_or_warn("test"), None);
    }
}
