use crate::error::CryptoError;

/// Result type for encryption operations
pub type EncryptionResult<T> = Result<T, CryptoError>;

/// Symmetric authenticated encryption over byte buffers
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> EncryptionResult<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8]) -> EncryptionResult<Vec<u8>>;

    /// Algorithm name recorded next to ciphertext
    fn algorithm(&self) -> &str;
}
