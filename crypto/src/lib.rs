//! Content encryption for protected documents
//!
//! Protected content is sealed with a fresh AES-256-GCM data key per
//! document. The data key is wrapped by a longer-lived master key and stored
//! next to the ciphertext as a [`WrappedKey`], so re-protecting a document
//! never touches other documents and the master key never leaves its store.

pub mod aes_gcm;
pub mod encryption;
pub mod envelope;
pub mod error;

pub use crate::aes_gcm::{Aes256GcmEncryptor, KeyGenerator, KEY_LEN, NONCE_LEN};
pub use encryption::{EncryptionResult, Encryptor};
pub use envelope::{ContentKeyWrapper, WrappedKey};
pub use error::{CryptoError, CryptoResult};
