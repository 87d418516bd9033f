//! Mapping of library errors onto the SDK taxonomy

use audit_engine::AuditError;
use crypto::CryptoError;
use error_common::SdkError;
use logger_redacted::LoggerError;

pub(crate) fn from_crypto(err: CryptoError) -> SdkError {
    match err {
        CryptoError::KeyMismatch { .. } => {
            SdkError::access_denied("Content was protected with a key this profile does not hold")
        }
        CryptoError::InvalidFormat(_) | CryptoError::DecryptionFailed(_) => {
            SdkError::bad_input(format!("Corrupt protected content: {err}"))
        }
        CryptoError::UnsupportedKeyVersion { .. } => SdkError::not_supported(err.to_string()),
        other => SdkError::internal(other.to_string()),
    }
}

pub(crate) fn from_audit(err: AuditError) -> SdkError {
    match err {
        AuditError::StorageError(e) => SdkError::file_io(format!("Audit sink unavailable: {e}")),
        other => SdkError::internal(format!("Audit record rejected: {other}")),
    }
}

pub(crate) fn from_logger(err: LoggerError) -> SdkError {
    match err {
        LoggerError::InvalidLevel(level) => SdkError::bad_input(format!("Invalid log level: {level}")),
        other => SdkError::file_io(format!("Logger delegate failed to initialize: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_common::ErrorKind;

    #[test]
    fn test_key_mismatch_is_access_denied() {
        let err = from_crypto(CryptoError::KeyMismatch {
            expected: "a".to_string(),
            actual: "b".to_string(),
        });
        assert!(err.is(ErrorKind::AccessDenied));
    }

    #[test]
    fn test_corrupt_ciphertext_is_bad_input() {
        let err = from_crypto(CryptoError::DecryptionFailed("tag".to_string()));
        assert!(err.is(ErrorKind::BadInput));
    }
}
