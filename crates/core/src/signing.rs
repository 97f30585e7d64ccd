//! HMAC-SHA256 signing for collaborator webhooks.
//!
//! Providers sign the raw request body with a shared secret and send the
//! lowercase hex digest in [`SIGNATURE_HEADER`]. The identity provider also
//! expects outgoing status reads to be signed the same way.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the hex-encoded signature.
pub const SIGNATURE_HEADER: &str = "x-hmac-signature";

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature against `payload` in constant time.
///
/// Malformed hex is treated as a mismatch.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Some(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string (either case). `None` on odd length or bad digit.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
            .collect()
    }
}
