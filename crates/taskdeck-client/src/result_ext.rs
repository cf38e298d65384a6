//! Logging helpers for API results.

use crate::error::ApiError;

/// Adds `log` to API results so call sites can record a failure with context
/// and keep propagating it.
pub trait ApiResultExt<T> {
    /// Log the error if this is an `Err`. Client errors (4xx) log at `warn`,
    /// everything else at `error`. The result is returned unchanged.
    fn log<S: ToString>(self, context: S) -> Result<T, ApiError>;
}

impl<T> ApiResultExt<T> for Result<T, ApiError> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, ApiError> {
        if let Err(ref e) = self {
            let caller = std::panic::Location::caller();
            let location = format!("{}:{}", caller.file(), caller.line());
            let context = context.to_string();
            match e.status() {
                Some(status) if (400..500).contains(&status) => tracing::warn!(
                    target: "taskdeck_client",
                    status,
                    error = %e,
                    file = %location,
                    context = %context,
                    "Request rejected"
                ),
                status => tracing::error!(
                    target: "taskdeck_client",
                    status = ?status,
                    error = %e,
                    file = %location,
                    context = %context,
                    "Request failed"
                ),
            }
        }
        self
    }
}
