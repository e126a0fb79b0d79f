//! Small helpers for handling secrets outside the vault.
//!
//! Webhook signing, API key generation and log masking.

use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex HMAC-SHA256 signature of a webhook payload.
#[must_use]
pub fn sign_webhook_payload(payload: &[u8], secret: &str) -> String {
    let mut mac = new_mac(secret);
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex HMAC-SHA256 webhook signature in constant time.
///
/// Malformed signatures are treated as mismatches.
#[must_use]
pub fn verify_webhook_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let mut mac = new_mac(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &str) -> HmacSha256 {
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
}

/// Generates an API key of the form `<prefix>_<64 hex chars>`.
#[must_use]
pub fn generate_api_key(prefix: &str) -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!("{prefix}_{}", hex::encode(bytes))
}

/// Masks the middle of a sensitive value for logging.
///
/// Keeps `visible` characters at each end. Values too short to keep both
/// ends are masked entirely.
#[must_use]
pub fn mask_sensitive(value: &str, visible: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    let kept = visible.saturating_mul(2);
    if chars.len() <= kept {
        return "*".repeat(chars.len());
    }
    let start: String = chars[..visible].iter().collect();
    let end: String = chars[chars.len() - visible..].iter().collect();
    format!("{start}{}{end}", "*".repeat(chars.len() - kept))
}
