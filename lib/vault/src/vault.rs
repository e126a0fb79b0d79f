//! Credential vault: sealing credentials into storable tokens.
//!
//! A sealed token is `base64(json)` of an envelope holding the three blob
//! fields as lowercase hex:
//!
//! ```text
//! {"encrypted": "<hex>", "iv": "<hex>", "authTag": "<hex>"}
//! ```
//!
//! The format is persisted. Changing it means re-sealing every stored token.

use crate::cipher::{Cipher, EncryptedBlob};
use crate::credential::{ConnectorCredentials, ConnectorRole};
use crate::error::{UnreadableKind, VaultError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, transport-safe encrypted credential payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedToken(String);

impl SealedToken {
    /// Wraps a token loaded from storage.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(token)
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SealedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedToken({} bytes)", self.0.len())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    encrypted: String,
    iv: String,
    #[serde(rename = "authTag")]
    auth_tag: String,
}

impl Envelope {
    fn from_blob(blob: &EncryptedBlob) -> Self {
        Self {
            encrypted: hex::encode(&blob.ciphertext),
            iv: hex::encode(&blob.iv),
            auth_tag: hex::encode(&blob.auth_tag),
        }
    }

    fn into_blob(self) -> Result<EncryptedBlob, VaultError> {
        let decode = |field: &str| {
            hex::decode(field).map_err(|_| VaultError::unreadable(UnreadableKind::Encoding))
        };
        Ok(EncryptedBlob {
            ciphertext: decode(&self.encrypted)?,
            iv: decode(&self.iv)?,
            auth_tag: decode(&self.auth_tag)?,
        })
    }
}

/// Seals and opens connector credentials.
///
/// Stateless beyond the cipher it owns, so it can be shared freely.
#[derive(Debug, Clone)]
pub struct CredentialVault {
    cipher: Cipher,
}

impl CredentialVault {
    /// Creates a vault around a cipher.
    #[must_use]
    pub fn new(cipher: Cipher) -> Self {
        Self { cipher }
    }

    /// Validates and seals connector credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials fail validation.
    pub fn seal(&self, credentials: &ConnectorCredentials) -> Result<SealedToken, VaultError> {
        credentials
            .validate()
            .map_err(VaultError::InvalidCredentials)?;
        let payload = serde_json::to_vec(credentials).map_err(|_| VaultError::Serialization)?;
        self.seal_bytes(&payload)
    }

    /// Seals credentials after checking they fit the given integration side.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the connector cannot be used
    /// in that role.
    pub fn seal_for(
        &self,
        role: ConnectorRole,
        credentials: &ConnectorCredentials,
    ) -> Result<SealedToken, VaultError> {
        credentials
            .validate_for(role)
            .map_err(VaultError::InvalidCredentials)?;
        self.seal(credentials)
    }

    /// Opens a sealed token back into validated credentials.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Unreadable` if decoding, decryption, parsing or
    /// validation fails.
    pub fn open(&self, token: &str) -> Result<ConnectorCredentials, VaultError> {
        let plaintext = self.open_bytes(token)?;
        let credentials: ConnectorCredentials = serde_json::from_slice(&plaintext)
            .map_err(|_| VaultError::unreadable(UnreadableKind::Schema))?;
        credentials
            .validate()
            .map_err(|_| VaultError::unreadable(UnreadableKind::Schema))?;
        Ok(credentials)
    }

    /// Seals an arbitrary non-empty byte payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is empty.
    pub fn seal_bytes(&self, payload: &[u8]) -> Result<SealedToken, VaultError> {
        let blob = self.cipher.encrypt(payload)?;
        let envelope =
            serde_json::to_vec(&Envelope::from_blob(&blob)).map_err(|_| VaultError::Serialization)?;
        Ok(SealedToken(STANDARD.encode(envelope)))
    }

    /// Opens a token produced by [`seal_bytes`](Self::seal_bytes).
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Unreadable` if any decoding step or the
    /// authentication check fails.
    pub fn open_bytes(&self, token: &str) -> Result<Vec<u8>, VaultError> {
        let raw = STANDARD
            .decode(token.trim())
            .map_err(|_| VaultError::unreadable(UnreadableKind::Encoding))?;
        let envelope: Envelope = serde_json::from_slice(&raw)
            .map_err(|_| VaultError::unreadable(UnreadableKind::Encoding))?;
        let blob = envelope.into_blob()?;
        Ok(self.cipher.decrypt(&blob)?)
    }
}
