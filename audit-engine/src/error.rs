use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit entry validation failed: {0}")]
    ValidationError(String),

    #[error("Audit storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("Audit serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
