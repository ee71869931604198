//! Result extension trait for logging errors with context.
//!
//! Adds a `log` method to `Result` types so a failure is recorded with
//! its context and source location before it is propagated.

use std::fmt::Display;
use tracing::error;

/// Extension trait for logging errors with context.
pub trait ResultExt<T, E> {
    /// Log the error with context if this is an `Err` variant.
    ///
    /// Returns the original `Result` unchanged.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use usage_dashboard::result_ext::ResultExt;
    ///
    /// let keys = store.list().await.log("listing keys for aggregation")?;
    /// ```
    fn log<S: ToString>(self, context: S) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller_location = std::panic::Location::caller();
            error!(
                target: "usage_dashboard",
                error = %e,
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Operation failed"
            );
        }
        self
    }
}

/// Extension trait for logging a missing value, returning the Option.
pub trait OptionResultExt<T> {
    /// Log if this is a `None` variant.
    fn log_none<S: ToString>(self, context: S) -> Option<T>;
}

impl<T> OptionResultExt<T> for Option<T> {
    #[track_caller]
    fn log_none<S: ToString>(self, context: S) -> Option<T> {
        if self.is_none() {
            let caller_location = std::panic::Location::caller();
            tracing::warn!(
                target: "usage_dashboard",
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Expected value was None"
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_ext_passes_value_through() {
        let result: Result<usize, &str> = Ok(3);
        assert_eq!(result.log("counting keys").unwrap(), 3);
    }

    #[test]
    fn test_result_ext_keeps_error() {
        let result: Result<usize, &str> = Err("store offline");
        assert_eq!(result.log("counting keys").unwrap_err(), "store offline");
    }

    #[test]
    fn test_option_ext_none() {
        let opt: Option<&str> = None;
        assert!(opt.log_none("looking up key").is_none());
    }
}
