//! API key generation, hashing, and webhook HMAC signing utilities.
//!
//! This module lives in `core` (zero internal deps) so it can be used by the
//! repository layer, the HTTP server and the webhook dispatcher.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of the generated API key string (alphanumeric characters).
pub const KEY_LENGTH: usize = 48;

/// Number of leading characters stored as a human-visible prefix.
pub const KEY_PREFIX_LENGTH: usize = 8;

/// Header carrying the webhook signature on outbound deliveries.
pub const SIGNATURE_HEADER: &str = "X-Imprint-Signature";

/// Header carrying the event name on outbound deliveries.
pub const EVENT_HEADER: &str = "X-Imprint-Event";

/// Scheme prefix of the signature header value.
const SIGNATURE_SCHEME: &str = "sha256=";

// ---------------------------------------------------------------------------
// API key generation
// ---------------------------------------------------------------------------

/// The result of generating a new API key.
pub struct GeneratedApiKey {
    /// The plaintext key (shown to the user exactly once, never stored).
    pub plaintext: String,
    /// The first [`KEY_PREFIX_LENGTH`] characters of the key for display.
    pub prefix: String,
    /// The SHA-256 hex digest of the plaintext key (stored in the database).
    pub hash: String,
}

/// Generate a new random API key.
///
/// Returns the plaintext (shown once), prefix (for identification), and
/// SHA-256 hash (for storage). The plaintext must never be persisted.
pub fn generate_api_key() -> GeneratedApiKey {
    let key: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_LENGTH)
        .map(char::from)
        .collect();

    let prefix = key[..KEY_PREFIX_LENGTH].to_string();
    let hash = hash_api_key(&key);

    GeneratedApiKey {
        plaintext: key,
        prefix,
        hash,
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Compute the SHA-256 hex digest of an API key.
///
/// Used both during key creation (to store the hash) and during
/// authentication (to look up the key by hash).
pub fn hash_api_key(key: &str) -> String {
    crate::hashing::sha256_hex(key.as_bytes())
}

/// Extract the prefix from a plaintext API key.
pub fn extract_prefix(key: &str) -> &str {
    let end = key
        .char_indices()
        .nth(KEY_PREFIX_LENGTH)
        .map_or(key.len(), |(idx, _)| idx);
    &key[..end]
}

/// Pull the key out of an `Authorization: Bearer <key>` header value.
///
/// Returns `None` for any other scheme or an empty key.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let key = header_value.strip_prefix("Bearer ")?.trim();
    (!key.is_empty()).then_some(key)
}

// ---------------------------------------------------------------------------
// Webhook HMAC signing
// ---------------------------------------------------------------------------

type HmacSha256 = Hmac<Sha256>;

/// Compute an HMAC-SHA256 signature for a webhook payload.
///
/// The `secret` is the webhook-specific signing secret. The `payload` is the
/// JSON body being delivered. Returns the hex-encoded signature string.
pub fn compute_webhook_hmac(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    hex::encode(result.into_bytes())
}

/// Build the full `X-Imprint-Signature` header value (`sha256=<hex>`).
pub fn signature_header_value(secret: &str, payload: &str) -> String {
    format!("{SIGNATURE_SCHEME}{}", compute_webhook_hmac(secret, payload))
}

/// Check a received `sha256=<hex>` header against the expected signature.
///
/// Receivers use this to authenticate deliveries; the comparison is done
/// through the MAC so it runs in constant time.
pub fn verify_webhook_signature(secret: &str, payload: &str, header_value: &str) -> bool {
    let Some(hex_sig) = header_value.strip_prefix(SIGNATURE_SCHEME) else {
        return false;
    };
    let Some(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

// ---------------------------------------------------------------------------
// hex encoding helper (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string; `None` on odd length or non-hex characters.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
