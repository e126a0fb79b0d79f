//! Credential vault for the integration hub.
//!
//! This crate provides:
//!
//! - **Cipher**: AES-256-GCM encryption of credential payloads
//! - **Credential vault**: Sealing connector credentials into storable tokens
//! - **Credential schemas**: Per-connector credential types, validated before sealing
//! - **Secret helpers**: Webhook signatures, API keys and log masking
//!
//! # Example
//!
//! ```
//! use integration_hub_vault::{
//!     Cipher, ConnectorCredentials, CredentialVault, EncryptionKey,
//! };
//!
//! let key = EncryptionKey::from_hex("ENCRYPTION_KEY", &"00".repeat(32)).unwrap();
//! let vault = CredentialVault::new(Cipher::new(&key));
//!
//! let credentials = ConnectorCredentials::Stripe {
//!     secret_key: "sk_test_123".to_string(),
//! };
//! let token = vault.seal(&credentials).unwrap();
//! assert_eq!(vault.open(token.as_str()).unwrap(), credentials);
//! ```

pub mod cipher;
pub mod credential;
pub mod error;
pub mod key;
pub mod secrets;
pub mod vault;

pub use cipher::{Cipher, EncryptedBlob};
pub use credential::{ConnectorCredentials, ConnectorKind, ConnectorRole, OAuthTokens};
pub use error::{CipherError, ConfigurationError, CredentialError, UnreadableKind, VaultError};
pub use key::{ENCRYPTION_KEY_NAME, EncryptionKey, SecretStore};
pub use vault::{CredentialVault, SealedToken};
