// Error reporting through tracing

use crate::types::SdkError;

/// Emits SDK errors as structured `tracing` events
#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    component: String,
}

impl ErrorReporter {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn report(&self, error: &SdkError) {
        // Retryable failures are expected churn; everything else is surfaced as an error.
        if error.is_retryable() {
            tracing::warn!(
                component = %self.component,
                error_id = %error.error_id(),
                error_kind = error.kind().name(),
                error_code = error.code(),
                "{}",
                error.message()
            );
        } else {
            tracing::error!(
                component = %self.component,
                error_id = %error.error_id(),
                error_kind = error.kind().name(),
                error_code = error.code(),
                "{}",
                error.message()
            );
        }
    }
}

/// Logs an error with the operation it came from
pub fn log_error(context: &str, error: &SdkError) {
    tracing::error!(
        context = context,
        error_id = %error.error_id(),
        error = %error,
        "SDK operation failed"
    );
}
