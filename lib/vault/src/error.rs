//! Error types for the vault crate.
//!
//! Errors are layered the same way the vault is:
//! - `ConfigurationError`: Key material problems, fatal at startup
//! - `CipherError`: Authenticated-encryption failures on a single blob
//! - `CredentialError`: Connector credential schema violations
//! - `VaultError`: Sealing/opening failures surfaced to callers
//!
//! None of these types ever carry plaintext, key bytes or token contents.

use crate::credential::{ConnectorKind, ConnectorRole};
use std::fmt;

/// Errors from loading key material.
///
/// These are startup-only; a process that hits one must not start serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The secret store has no value under the expected name.
    MissingKey { name: String },
    /// The key is not valid hex.
    InvalidKeyEncoding { name: String },
    /// The key decodes to the wrong number of bytes.
    InvalidKeyLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { name } => write!(f, "secret '{name}' is not set"),
            Self::InvalidKeyEncoding { name } => {
                write!(f, "secret '{name}' must be hex encoded")
            }
            Self::InvalidKeyLength {
                name,
                expected,
                actual,
            } => write!(
                f,
                "secret '{name}' must decode to {expected} bytes, got {actual}"
            ),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors from the symmetric cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Refused to encrypt an empty payload.
    EmptyPlaintext,
    /// The AEAD implementation rejected the encryption request.
    EncryptionFailed,
    /// A blob field is missing or has the wrong shape.
    Format { reason: &'static str },
    /// The authentication tag did not verify (tampering or wrong key).
    Integrity,
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPlaintext => write!(f, "plaintext to encrypt cannot be empty"),
            Self::EncryptionFailed => write!(f, "encryption failed"),
            Self::Format { reason } => write!(f, "malformed encrypted blob: {reason}"),
            Self::Integrity => write!(f, "authentication tag mismatch"),
        }
    }
}

impl std::error::Error for CipherError {}

/// Errors from validating connector credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// A required field is empty.
    MissingField {
        connector: ConnectorKind,
        field: &'static str,
    },
    /// A field is present but malformed.
    InvalidField {
        connector: ConnectorKind,
        field: &'static str,
        reason: &'static str,
    },
    /// The connector cannot be used on this side of an integration.
    UnsupportedRole {
        connector: ConnectorKind,
        role: ConnectorRole,
    },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { connector, field } => {
                write!(f, "{connector} credentials are missing '{field}'")
            }
            Self::InvalidField {
                connector,
                field,
                reason,
            } => write!(f, "{connector} credential field '{field}' {reason}"),
            Self::UnsupportedRole { connector, role } => {
                write!(f, "{connector} cannot be used as a {role}")
            }
        }
    }
}

impl std::error::Error for CredentialError {}

/// Why a sealed token could not be opened.
///
/// Only for server-side diagnostics: callers see one message for every kind,
/// so a tampered token and a corrupt one are indistinguishable from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadableKind {
    /// Base64, envelope JSON or hex decoding failed.
    Encoding,
    /// The decoded blob had a malformed field.
    Format,
    /// Authentication failed.
    Integrity,
    /// The plaintext did not parse as valid connector credentials.
    Schema,
}

impl fmt::Display for UnreadableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Encoding => "encoding",
            Self::Format => "format",
            Self::Integrity => "integrity",
            Self::Schema => "schema",
        };
        f.write_str(kind)
    }
}

/// Errors from sealing and opening credential tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// Credentials failed validation before sealing.
    InvalidCredentials(CredentialError),
    /// The payload could not be serialized.
    Serialization,
    /// The cipher refused to encrypt.
    Encryption(CipherError),
    /// The token could not be turned back into credentials.
    Unreadable { kind: UnreadableKind },
}

impl VaultError {
    /// Returns the diagnostic kind for an unreadable token.
    #[must_use]
    pub fn unreadable_kind(&self) -> Option<UnreadableKind> {
        match self {
            Self::Unreadable { kind } => Some(*kind),
            _ => None,
        }
    }

    pub(crate) fn unreadable(kind: UnreadableKind) -> Self {
        Self::Unreadable { kind }
    }
}

impl From<CipherError> for VaultError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::Integrity => Self::unreadable(UnreadableKind::Integrity),
            CipherError::Format { .. } => Self::unreadable(UnreadableKind::Format),
            other => Self::Encryption(other),
        }
    }
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials(err) => write!(f, "invalid credentials: {err}"),
            Self::Serialization => write!(f, "credentials could not be serialized"),
            Self::Encryption(err) => write!(f, "credentials could not be sealed: {err}"),
            Self::Unreadable { .. } => write!(f, "failed to decrypt credentials"),
        }
    }
}

impl std::error::Error for VaultError {}
