//! Authenticated symmetric encryption for credential payloads.
//!
//! Uses AES-256-GCM with a fresh random 96-bit nonce per call and a detached
//! 128-bit tag. Tag verification happens inside the AEAD implementation, which
//! compares in constant time.

use crate::error::CipherError;
use crate::key::EncryptionKey;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit, Nonce, OsRng, Tag};
use aes_gcm::{Aes256Gcm, Key};

/// Length of the initialization vector in bytes.
pub const IV_LEN: usize = 12;

/// Length of the authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Opaque at-rest representation of an encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    /// Encrypted payload, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// Nonce used for this encryption.
    pub iv: Vec<u8>,
    /// Authentication tag over the ciphertext.
    pub auth_tag: Vec<u8>,
}

/// Symmetric credential cipher bound to one key.
#[derive(Clone)]
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    /// Creates a cipher for the given key.
    #[must_use]
    pub fn new(key: &EncryptionKey) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Self {
            aead: Aes256Gcm::new(key),
        }
    }

    /// Encrypts a non-empty payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the plaintext is empty.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, CipherError> {
        if plaintext.is_empty() {
            return Err(CipherError::EmptyPlaintext);
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut buffer = plaintext.to_vec();
        let tag = self
            .aead
            .encrypt_in_place_detached(&nonce, b"", &mut buffer)
            .map_err(|_| CipherError::EncryptionFailed)?;

        Ok(EncryptedBlob {
            ciphertext: buffer,
            iv: nonce.to_vec(),
            auth_tag: tag.to_vec(),
        })
    }

    /// Decrypts a blob produced by a cipher holding the same key.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Format` if a field is missing or the wrong size
    /// and `CipherError::Integrity` if the tag does not verify.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>, CipherError> {
        if blob.ciphertext.is_empty() {
            return Err(CipherError::Format {
                reason: "ciphertext is empty",
            });
        }
        if blob.iv.len() != IV_LEN {
            return Err(CipherError::Format {
                reason: "iv has the wrong length",
            });
        }
        if blob.auth_tag.len() != TAG_LEN {
            return Err(CipherError::Format {
                reason: "auth tag has the wrong length",
            });
        }

        let nonce = Nonce::<Aes256Gcm>::from_slice(&blob.iv);
        let tag = Tag::<Aes256Gcm>::from_slice(&blob.auth_tag);
        let mut buffer = blob.ciphertext.clone();
        self.aead
            .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
            .map_err(|_| CipherError::Integrity)?;

        Ok(buffer)
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KEY_LEN;

    fn cipher() -> Cipher {
        Cipher::new(&EncryptionKey::from_bytes([0x42; KEY_LEN]))
    }

    #[test]
    fn encrypt_then_decrypt_returns_plaintext() {
        let cipher = cipher();
        let blob = cipher.encrypt(b"sk_live_123").expect("encrypt");
        assert_eq!(blob.iv.len(), IV_LEN);
        assert_eq!(blob.auth_tag.len(), TAG_LEN);
        assert_ne!(blob.ciphertext, b"sk_live_123");
        assert_eq!(cipher.decrypt(&blob).expect("decrypt"), b"sk_live_123");
    }

    #[test]
    fn empty_plaintext_is_rejected() {
        assert_eq!(cipher().encrypt(b"").unwrap_err(), CipherError::EmptyPlaintext);
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let cipher = cipher();
        let first = cipher.encrypt(b"same payload").expect("encrypt");
        let second = cipher.encrypt(b"same payload").expect("encrypt");
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn wrong_key_fails_integrity() {
        let blob = cipher().encrypt(b"payload").expect("encrypt");
        let other = Cipher::new(&EncryptionKey::from_bytes([0x43; KEY_LEN]));
        assert_eq!(other.decrypt(&blob).unwrap_err(), CipherError::Integrity);
    }

    #[test]
    fn flipped_bits_fail_integrity() {
        let cipher = cipher();
        let blob = cipher.encrypt(b"payload").expect("encrypt");

        let mut tampered = blob.clone();
        tampered.ciphertext[0] ^= 0x01;
        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), CipherError::Integrity);

        let mut tampered = blob.clone();
        tampered.iv[IV_LEN - 1] ^= 0x80;
        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), CipherError::Integrity);

        let mut tampered = blob;
        tampered.auth_tag[3] ^= 0x10;
        assert_eq!(cipher.decrypt(&tampered).unwrap_err(), CipherError::Integrity);
    }

    #[test]
    fn malformed_fields_fail_format() {
        let cipher = cipher();
        let blob = cipher.encrypt(b"payload").expect("encrypt");

        let mut short_iv = blob.clone();
        short_iv.iv.pop();
        assert!(matches!(
            cipher.decrypt(&short_iv),
            Err(CipherError::Format { .. })
        ));

        let mut missing_tag = blob.clone();
        missing_tag.auth_tag.clear();
        assert!(matches!(
            cipher.decrypt(&missing_tag),
            Err(CipherError::Format { .. })
        ));

        let mut empty = blob;
        empty.ciphertext.clear();
        assert!(matches!(
            cipher.decrypt(&empty),
            Err(CipherError::Format { .. })
        ));
    }

    #[test]
    fn cipher_is_shareable_across_threads() {
        let cipher = cipher();
        std::thread::scope(|scope| {
            for i in 0..4u8 {
                let cipher = &cipher;
                scope.spawn(move || {
                    let blob = cipher.encrypt(&[i + 1; 64]).expect("encrypt");
                    assert_eq!(cipher.decrypt(&blob).expect("decrypt"), vec![i + 1; 64]);
                });
            }
        });
    }
}
