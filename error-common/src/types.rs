use crate::codes;
use crate::context::ErrorContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Closed set of failure categories surfaced by the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BadInput,
    FileIo,
    Network,
    TransientNetwork,
    Internal,
    JustificationRequired,
    NotSupportedOperation,
    PrivilegedRequired,
    AccessDenied,
    ConsentDenied,
    PolicySync,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::BadInput,
        ErrorKind::FileIo,
        ErrorKind::Network,
        ErrorKind::TransientNetwork,
        ErrorKind::Internal,
        ErrorKind::JustificationRequired,
        ErrorKind::NotSupportedOperation,
        ErrorKind::PrivilegedRequired,
        ErrorKind::AccessDenied,
        ErrorKind::ConsentDenied,
        ErrorKind::PolicySync,
    ];

    /// Stable name hosts can match on
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadInput => "BadInputError",
            ErrorKind::FileIo => "FileIOError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::TransientNetwork => "TransientNetworkError",
            ErrorKind::Internal => "InternalError",
            ErrorKind::JustificationRequired => "JustificationRequiredError",
            ErrorKind::NotSupportedOperation => "NotSupportedError",
            ErrorKind::PrivilegedRequired => "PrivilegedRequiredError",
            ErrorKind::AccessDenied => "AccessDeniedError",
            ErrorKind::ConsentDenied => "ConsentDeniedError",
            ErrorKind::PolicySync => "PolicySyncError",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadInput => codes::input::BAD_INPUT,
            ErrorKind::NotSupportedOperation => codes::input::NOT_SUPPORTED,
            ErrorKind::FileIo => codes::io::FILE_IO,
            ErrorKind::Network => codes::network::NETWORK,
            ErrorKind::TransientNetwork => codes::network::TRANSIENT_NETWORK,
            ErrorKind::PolicySync => codes::network::POLICY_SYNC,
            ErrorKind::AccessDenied => codes::authorization::ACCESS_DENIED,
            ErrorKind::ConsentDenied => codes::authorization::CONSENT_DENIED,
            ErrorKind::PrivilegedRequired => codes::authorization::PRIVILEGED_REQUIRED,
            ErrorKind::JustificationRequired => codes::authorization::JUSTIFICATION_REQUIRED,
            ErrorKind::Internal => codes::system::INTERNAL,
        }
    }

    /// Only transient network failures may be retried by the host.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientNetwork)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error delivered by both the synchronous and the observer-based API
///
/// Clones keep the same `error_id`, so a failure logged by the dispatcher and
/// the copy handed to an observer can be correlated.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct SdkError {
    kind: ErrorKind,
    message: String,
    error_id: Uuid,
    context: ErrorContext,
}

impl SdkError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            error_id: Uuid::new_v4(),
            context: ErrorContext::default(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadInput, message)
    }

    pub fn file_io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FileIo, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn transient_network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientNetwork, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn justification_required() -> Self {
        Self::new(ErrorKind::JustificationRequired, "Justification is required")
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupportedOperation, message)
    }

    pub fn privileged_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PrivilegedRequired, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    pub fn consent_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConsentDenied, message)
    }

    pub fn policy_sync(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PolicySync, message)
    }

    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context = self.context.add_context(key, value);
        self
    }

    pub fn with_error_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_id(&self) -> Uuid {
        self.error_id
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        SdkError::file_io(err.to_string()).with_context("io_kind", format!("{:?}", err.kind()))
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::bad_input(format!("Invalid JSON: {err}"))
    }
}

/// Result type alias for SDK operations
pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_network_is_retryable() {
        for kind in ErrorKind::ALL {
            assert_eq!(kind.is_retryable(), kind == ErrorKind::TransientNetwork, "{kind}");
        }
        assert!(!SdkError::network("down").is_retryable());
        assert!(SdkError::transient_network("429").is_retryable());
    }

    #[test]
    fn test_clone_keeps_identity() {
        let err = SdkError::access_denied("no VIEW right").with_context("right", "VIEW");
        let copy = err.clone();

        assert_eq!(copy.error_id(), err.error_id());
        assert_eq!(copy.kind(), ErrorKind::AccessDenied);
        assert_eq!(copy.context().additional.get("right").map(String::as_str), Some("VIEW"));
    }

    #[test]
    fn test_display_includes_kind_name() {
        let err = SdkError::justification_required();
        assert_eq!(err.to_string(), "JustificationRequiredError: Justification is required");
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<&str> = ErrorKind::ALL.iter().map(ErrorKind::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_io_error_maps_to_file_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.docx");
        let err: SdkError = io.into();
        assert!(err.is(ErrorKind::FileIo));
        assert_eq!(err.context().additional.get("io_kind").map(String::as_str), Some("NotFound"));
    }
}
