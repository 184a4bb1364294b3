pub mod der;
pub mod ecdh;
pub mod ece;
pub mod hkdf;

use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD, decode_config, encode_config};

pub fn encode_base64url(bytes: &[u8]) -> String {
    encode_config(bytes, URL_SAFE_NO_PAD)
}

/// Browsers hand out keys in either alphabet, padded or not.
pub fn decode_base64url(raw: &str) -> Option<Vec<u8>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, URL_SAFE))
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .ok()
}
