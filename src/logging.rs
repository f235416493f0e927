use std::fmt;

use crate::error::ValidatorError;

/// Request-scoped logging interface.
///
/// `ValidationLog` is obtained from [`RequestContext::log`](crate::RequestContext::log)
/// and is lifetime-bound to the context it came from. Every event carries
/// the request ID so validation failures can be correlated with access
/// logs.
#[derive(Debug, Clone, Copy)]
pub struct ValidationLog<'a> {
    request_id: &'a str,
}

impl<'a> ValidationLog<'a> {
    pub(crate) fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }

    /// Returns the request ID associated with this logger.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs a validation error.
    ///
    /// Integrity failures are logged at `warn`, editable-data failures at
    /// `info`. Each error should be recorded exactly once.
    pub fn error_record(&self, error: &ValidatorError) {
        let code = error.code().as_str();
        let kind = error.kind();
        let target = error.target().unwrap_or("");
        let parameter = error.parameter().unwrap_or("");
        let value = error.value().unwrap_or("");
        let original_value = error.original_value().unwrap_or("");

        if error.is_soft() {
            tracing::info!(
                request_id = %self.request_id,
                code,
                kind = %kind,
                target,
                parameter,
                value,
                original_value,
                "editable data validation failed"
            );
        } else {
            tracing::warn!(
                request_id = %self.request_id,
                code,
                kind = %kind,
                target,
                parameter,
                value,
                original_value,
                "request rejected"
            );
        }
    }

    /// Logs an info-level message with request ID.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a warning-level message with request ID.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, "{}", args);
    }

    /// Logs a debug-level message with request ID.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, "{}", args);
    }
}
