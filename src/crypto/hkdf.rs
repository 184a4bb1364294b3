//! HKDF (RFC 5869) over HMAC-SHA-256.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const HASH_LEN: usize = 32;

pub(crate) fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; HASH_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// `salt` keys the HMAC; `ikm` is the message.
pub fn extract(salt: &[u8], ikm: &[u8]) -> [u8; HASH_LEN] {
    hmac_sha256(salt, &[ikm])
}

/// Output is truncated to `length`, which must not exceed 255 blocks.
pub fn expand(prk: &[u8], info: &[u8], length: usize) -> Vec<u8> {
    assert!(length <= 255 * HASH_LEN, "hkdf output length too large");
    let mut okm = Vec::with_capacity(length + HASH_LEN);
    let mut previous: Option<[u8; HASH_LEN]> = None;
    let mut counter = 1u8;
    while okm.len() < length {
        let counter_byte = [counter];
        let block = match previous {
            Some(ref prev) => hmac_sha256(prk, &[prev.as_slice(), info, counter_byte.as_slice()]),
            None => hmac_sha256(prk, &[info, counter_byte.as_slice()]),
        };
        okm.extend_from_slice(&block);
        previous = Some(block);
        counter = counter.wrapping_add(1);
    }
    okm.truncate(length);
    okm
}
