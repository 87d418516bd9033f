//! Master key that wraps per-document content keys

use crate::error::from_crypto;
use crate::storage::write_atomic;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use crypto::{Aes256GcmEncryptor, ContentKeyWrapper, WrappedKey, KEY_LEN};
use error_common::{SdkError, SdkResult};
use std::path::{Path, PathBuf};
use tracing::info;
use zeroize::Zeroizing;

const KEY_DIR: &str = "protection";
const KEY_FILE: &str = "master.key";

pub(crate) struct KeyStore {
    wrapper: ContentKeyWrapper,
    location: Option<PathBuf>,
}

impl KeyStore {
    pub(crate) fn in_memory() -> SdkResult<Self> {
        let key = Zeroizing::new(Aes256GcmEncryptor::generate_key());
        Ok(Self {
            wrapper: ContentKeyWrapper::new(*key).map_err(from_crypto)?,
            location: None,
        })
    }

    /// Loads `<dir>/protection/master.key`, creating it on first use.
    pub(crate) fn load_or_create(dir: &Path) -> SdkResult<Self> {
        let path = dir.join(KEY_DIR).join(KEY_FILE);

        let key = if path.exists() {
            let encoded = Zeroizing::new(std::fs::read_to_string(&path)?);
            let decoded = Zeroizing::new(
                BASE64
                    .decode(encoded.trim())
                    .map_err(|e| SdkError::file_io(format!("Master key file is corrupt: {e}")))?,
            );
            let key: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
                SdkError::file_io(format!(
                    "Master key file holds {} bytes, expected {KEY_LEN}",
                    decoded.len()
                ))
            })?;
            Zeroizing::new(key)
        } else {
            let key = Zeroizing::new(Aes256GcmEncryptor::generate_key());
            let encoded = Zeroizing::new(BASE64.encode(key.as_slice()));
            write_atomic(&path, encoded.as_bytes())?;
            restrict_permissions(&path)?;
            info!(path = %path.display(), "created protection master key");
            key
        };

        Ok(Self {
            wrapper: ContentKeyWrapper::new(*key).map_err(from_crypto)?,
            location: Some(path),
        })
    }

    pub(crate) fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub(crate) fn seal(&self, plaintext: &[u8]) -> SdkResult<(Vec<u8>, WrappedKey)> {
        self.wrapper.seal(plaintext).map_err(from_crypto)
    }

    pub(crate) fn open(&self, ciphertext: &[u8], key: &WrappedKey) -> SdkResult<Vec<u8>> {
        self.wrapper.open(ciphertext, key).map_err(from_crypto)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> SdkResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> SdkResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();

        let first = KeyStore::load_or_create(dir.path()).unwrap();
        let (ciphertext, wrapped) = first.seal(b"quarterly numbers").unwrap();
        assert!(first.location().unwrap().ends_with("protection/master.key"));

        let second = KeyStore::load_or_create(dir.path()).unwrap();
        assert_eq!(second.open(&ciphertext, &wrapped).unwrap(), b"quarterly numbers");
    }

    #[test]
    fn test_foreign_key_is_access_denied() {
        let ours = KeyStore::in_memory().unwrap();
        let theirs = KeyStore::in_memory().unwrap();
        let (ciphertext, wrapped) = theirs.seal(b"x").unwrap();

        let err = ours.open(&ciphertext, &wrapped).unwrap_err();
        assert!(err.is(error_common::ErrorKind::AccessDenied));
    }

    #[test]
    fn test_truncated_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(KEY_DIR)).unwrap();
        std::fs::write(dir.path().join(KEY_DIR).join(KEY_FILE), BASE64.encode([1u8; 7])).unwrap();

        assert!(KeyStore::load_or_create(dir.path()).is_err());
    }
}
