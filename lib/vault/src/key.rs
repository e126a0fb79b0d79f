//! Key material for the credential cipher.
//!
//! The key is read exactly once, at process start, from a [`SecretStore`] and
//! then handed to the cipher explicitly. Nothing in this crate reads key
//! material from global state.

use crate::error::ConfigurationError;
use std::fmt;

/// Name under which the credential encryption key is stored.
pub const ENCRYPTION_KEY_NAME: &str = "ENCRYPTION_KEY";

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Source of named secrets available at startup.
pub trait SecretStore {
    /// Returns the secret stored under `name`, if any.
    fn get(&self, name: &str) -> Option<String>;
}

/// A 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a 64-character hex string into a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not hex or does not decode to
    /// exactly 32 bytes.
    pub fn from_hex(name: &str, value: &str) -> Result<Self, ConfigurationError> {
        let bytes = hex::decode(value.trim()).map_err(|_| ConfigurationError::InvalidKeyEncoding {
            name: name.to_string(),
        })?;
        let actual = bytes.len();
        let bytes: [u8; KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| ConfigurationError::InvalidKeyLength {
                    name: name.to_string(),
                    expected: KEY_LEN,
                    actual,
                })?;
        Ok(Self(bytes))
    }

    /// Loads the credential encryption key from a secret store.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or malformed.
    pub fn from_secret_store(store: &dyn SecretStore) -> Result<Self, ConfigurationError> {
        let value = store
            .get(ENCRYPTION_KEY_NAME)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingKey {
                name: ENCRYPTION_KEY_NAME.to_string(),
            })?;
        Self::from_hex(ENCRYPTION_KEY_NAME, &value)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}
