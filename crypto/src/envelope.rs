use crate::aes_gcm::{Aes256GcmEncryptor, KEY_LEN};
use crate::encryption::Encryptor;
use crate::error::{CryptoError, CryptoResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const ENVELOPE_VERSION: u32 = 1;

/// Data key of one protected document, wrapped by a master key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub version: u32,
    /// Fingerprint of the master key that wrapped `encrypted_dek`
    pub kek_id: String,
    /// Base64 of the wrapped data key
    pub encrypted_dek: String,
    pub dek_algorithm: String,
    pub data_algorithm: String,
}

/// Seals content under per-document data keys wrapped by one master key
///
/// 1. Generate a random data encryption key (DEK)
/// 2. Encrypt the content with the DEK
/// 3. Encrypt the DEK with the key encryption key (KEK)
pub struct ContentKeyWrapper {
    kek_encryptor: Aes256GcmEncryptor,
    kek_id: String,
}

impl ContentKeyWrapper {
    pub fn new(kek: [u8; KEY_LEN]) -> CryptoResult<Self> {
        let kek_id = fingerprint(&kek);
        let kek_encryptor = Aes256GcmEncryptor::new(kek)?;
        Ok(Self {
            kek_encryptor,
            kek_id,
        })
    }

    pub fn kek_id(&self) -> &str {
        &self.kek_id
    }

    pub fn seal(&self, plaintext: &[u8]) -> CryptoResult<(Vec<u8>, WrappedKey)> {
        let dek = Zeroizing::new(Aes256GcmEncryptor::generate_key());
        let dek_encryptor = Aes256GcmEncryptor::new(*dek)?;

        let ciphertext = dek_encryptor.encrypt(plaintext)?;
        let wrapped = self.kek_encryptor.encrypt(dek.as_slice())?;

        let key = WrappedKey {
            version: ENVELOPE_VERSION,
            kek_id: self.kek_id.clone(),
            encrypted_dek: BASE64.encode(wrapped),
            dek_algorithm: self.kek_encryptor.algorithm().to_string(),
            data_algorithm: dek_encryptor.algorithm().to_string(),
        };

        Ok((ciphertext, key))
    }

    pub fn open(&self, ciphertext: &[u8], key: &WrappedKey) -> CryptoResult<Vec<u8>> {
        if key.version != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedKeyVersion {
                version: key.version,
                supported: ENVELOPE_VERSION,
            });
        }
        if key.kek_id != self.kek_id {
            return Err(CryptoError::KeyMismatch {
                expected: key.kek_id.clone(),
                actual: self.kek_id.clone(),
            });
        }

        let wrapped = BASE64
            .decode(&key.encrypted_dek)
            .map_err(|e| CryptoError::InvalidFormat(format!("Base64 decode error: {e}")))?;
        let dek = Zeroizing::new(self.kek_encryptor.decrypt(&wrapped)?);

        let dek_encryptor = Aes256GcmEncryptor::from_slice(&dek)?;
        dek_encryptor.decrypt(ciphertext)
    }
}

fn fingerprint(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    BASE64.encode(digest.get(..9).unwrap_or_default())
}
