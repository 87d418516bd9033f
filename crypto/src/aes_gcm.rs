use crate::encryption::{EncryptionResult, Encryptor};
use crate::error::CryptoError;
use ::aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
const VERSION_LEN: usize = 4;

/// AES-256-GCM encryptor
///
/// Output layout: `key_version (u32, big endian) || nonce (12 bytes) || ciphertext+tag`.
/// A fresh random nonce is drawn for every call.
#[derive(ZeroizeOnDrop)]
pub struct Aes256GcmEncryptor {
    #[zeroize(skip)]
    cipher: Aes256Gcm,
    key: [u8; KEY_LEN],
    #[zeroize(skip)]
    key_version: u32,
}

impl Aes256GcmEncryptor {
    pub fn new(key: [u8; KEY_LEN]) -> EncryptionResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        Ok(Self {
            cipher,
            key,
            key_version: 1,
        })
    }

    pub fn from_slice(key: &[u8]) -> EncryptionResult<Self> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            got: key.len(),
        })?;
        Self::new(key)
    }

    pub fn from_base64(key_b64: &str) -> EncryptionResult<Self> {
        let mut key_bytes = BASE64
            .decode(key_b64.trim())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let result = Self::from_slice(&key_bytes);
        key_bytes.zeroize();
        result
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.key_version = version;
        self
    }

    pub fn generate_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    pub fn version(&self) -> u32 {
        self.key_version
    }
}

impl Encryptor for Aes256GcmEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> EncryptionResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut out = Vec::with_capacity(VERSION_LEN + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&self.key_version.to_be_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> EncryptionResult<Vec<u8>> {
        let (version_bytes, rest) = ciphertext
            .split_first_chunk::<VERSION_LEN>()
            .ok_or_else(|| CryptoError::InvalidFormat("missing key version".to_string()))?;
        let (nonce_bytes, body) = rest
            .split_first_chunk::<NONCE_LEN>()
            .ok_or_else(|| CryptoError::InvalidFormat("missing nonce".to_string()))?;

        let version = u32::from_be_bytes(*version_bytes);
        if version != self.key_version {
            return Err(CryptoError::UnsupportedKeyVersion {
                version,
                supported: self.key_version,
            });
        }

        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }

    fn algorithm(&self) -> &str {
        "AES-256-GCM"
    }
}

/// Secure key generation utilities
pub struct KeyGenerator;

impl KeyGenerator {
    pub fn generate_aes256_key() -> [u8; KEY_LEN] {
        Aes256GcmEncryptor::generate_key()
    }

    pub fn generate_aes256_key_base64() -> String {
        let mut key = Self::generate_aes256_key();
        let encoded = BASE64.encode(key);
        key.zeroize();
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_carries_version_and_nonce() {
        let encryptor = Aes256GcmEncryptor::new(Aes256GcmEncryptor::generate_key())
            .unwrap()
            .with_version(7);

        let sealed = encryptor.encrypt(b"quarterly numbers").unwrap();

        assert_eq!(&sealed[..4], &7u32.to_be_bytes());
        // 16-byte GCM tag follows the ciphertext
        assert_eq!(sealed.len(), 4 + NONCE_LEN + b"quarterly numbers".len() + 16);
        assert_eq!(encryptor.decrypt(&sealed).unwrap(), b"quarterly numbers");
    }

    #[test]
    fn test_different_nonces() {
        let encryptor = Aes256GcmEncryptor::new(Aes256GcmEncryptor::generate_key()).unwrap();
        let a = encryptor.encrypt(b"same").unwrap();
        let b = encryptor.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext() {
        let encryptor = Aes256GcmEncryptor::new(Aes256GcmEncryptor::generate_key()).unwrap();
        let mut sealed = encryptor.encrypt(b"authenticated").unwrap();
        if let Some(last) = sealed.last_mut() {
            *last ^= 0x01;
        }
        assert!(matches!(
            encryptor.decrypt(&sealed),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_wrong_version() {
        let key = Aes256GcmEncryptor::generate_key();
        let v1 = Aes256GcmEncryptor::new(key).unwrap();
        let v2 = Aes256GcmEncryptor::new(key).unwrap().with_version(2);

        let sealed = v1.encrypt(b"rotation").unwrap();
        assert_eq!(
            v2.decrypt(&sealed),
            Err(CryptoError::UnsupportedKeyVersion { version: 1, supported: 2 })
        );
    }

    #[test]
    fn test_truncated_input() {
        let encryptor = Aes256GcmEncryptor::new(Aes256GcmEncryptor::generate_key()).unwrap();
        assert!(matches!(encryptor.decrypt(&[0, 0, 0, 1, 9]), Err(CryptoError::InvalidFormat(_))));
    }

    #[test]
    fn test_invalid_key_length() {
        let short = BASE64.encode(b"too_short");
        assert_eq!(
            Aes256GcmEncryptor::from_base64(&short).err(),
            Some(CryptoError::InvalidKeyLength { expected: 32, got: 9 })
        );
    }

    #[test]
    fn test_from_base64() {
        let encoded = KeyGenerator::generate_aes256_key_base64();
        let encryptor = Aes256GcmEncryptor::from_base64(&encoded).unwrap();
        let sealed = encryptor.encrypt(b"").unwrap();
        assert!(encryptor.decrypt(&sealed).unwrap().is_empty());
    }
}
