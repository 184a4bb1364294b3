//! Message encryption for Web Push using the `aesgcm` content coding.
//!
//! An `aesgcm` request body is `ciphertext || tag (16)` alone: the salt and
//! the sender key travel in the `Encryption` and `Crypto-Key` headers.
//! [`EncryptedPayload::record`] frames the same output as one self-describing
//! record for stores and transports without headers:
//! `salt (16) || record size (u32 BE) || key id length (1) || sender key (65) || ciphertext || tag (16)`

use crate::crypto::ecdh::{EphemeralKeyPair, PUBLIC_KEY_LEN};
use crate::crypto::hkdf;
use crate::error::DispatchError;

use aes_gcm::Aes128Gcm;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Nonce;
use rand::{CryptoRng, RngCore};

pub const SALT_LEN: usize = 16;
pub const AUTH_SECRET_LEN: usize = 16;
pub const KEY_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const PADDING_LEN: usize = 2;
pub const RECORD_SIZE: u32 = 4096;
pub const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;

/// Largest plaintext that still fits in a single record.
pub const MAX_PLAINTEXT_LEN: usize = RECORD_SIZE as usize - PADDING_LEN - TAG_LEN;

const AUTH_INFO: &[u8] = b"Content-Encoding: auth\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aesgcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";
const CONTEXT_LABEL: &[u8] = b"P-256\0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKeys {
    pub cek: [u8; KEY_LEN],
    pub nonce: [u8; NONCE_LEN],
}

#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub salt: [u8; SALT_LEN],
    pub sender_public: [u8; PUBLIC_KEY_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub fn record(&self) -> Vec<u8> {
        frame_record(&self.salt, &self.sender_public, &self.ciphertext)
    }
}

fn context(receiver_public: &[u8], sender_public: &[u8]) -> Vec<u8> {
    let mut context =
        Vec::with_capacity(CONTEXT_LABEL.len() + 4 + receiver_public.len() + sender_public.len());
    context.extend_from_slice(CONTEXT_LABEL);
    context.extend_from_slice(&(receiver_public.len() as u16).to_be_bytes());
    context.extend_from_slice(receiver_public);
    context.extend_from_slice(&(sender_public.len() as u16).to_be_bytes());
    context.extend_from_slice(sender_public);
    context
}

/// The auth secret keys the first extract, binding the message to the
/// subscription it was issued for.
pub fn derive_content_keys(
    shared_secret: &[u8],
    auth_secret: &[u8],
    salt: &[u8; SALT_LEN],
    receiver_public: &[u8],
    sender_public: &[u8],
) -> ContentKeys {
    let auth_prk = hkdf::extract(auth_secret, shared_secret);
    let ikm = hkdf::expand(&auth_prk, AUTH_INFO, hkdf::HASH_LEN);
    let prk = hkdf::extract(salt, &ikm);

    let context = context(receiver_public, sender_public);
    let cek_info = [CEK_INFO, context.as_slice()].concat();
    let nonce_info = [NONCE_INFO, context.as_slice()].concat();

    let mut keys = ContentKeys {
        cek: [0u8; KEY_LEN],
        nonce: [0u8; NONCE_LEN],
    };
    keys.cek
        .copy_from_slice(&hkdf::expand(&prk, &cek_info, KEY_LEN));
    keys.nonce
        .copy_from_slice(&hkdf::expand(&prk, &nonce_info, NONCE_LEN));
    keys
}

/// Prepends the two-byte padding length; no padding bytes follow.
pub fn pad(plaintext: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(PADDING_LEN + plaintext.len());
    padded.extend_from_slice(&[0, 0]);
    padded.extend_from_slice(plaintext);
    padded
}

/// AES-128-GCM; the tag is appended to the ciphertext.
pub fn seal(keys: &ContentKeys, padded: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let cipher = Aes128Gcm::new_from_slice(&keys.cek)
        .map_err(|_| DispatchError::Encryption("invalid content encryption key".to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(&keys.nonce), padded)
        .map_err(|_| DispatchError::Encryption("AES-GCM encryption failed".to_string()))
}

pub fn frame_record(
    salt: &[u8; SALT_LEN],
    sender_public: &[u8; PUBLIC_KEY_LEN],
    sealed: &[u8],
) -> Vec<u8> {
    let mut record = Vec::with_capacity(HEADER_LEN + sealed.len());
    record.extend_from_slice(salt);
    record.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    record.push(PUBLIC_KEY_LEN as u8);
    record.extend_from_slice(sender_public);
    record.extend_from_slice(sealed);
    record
}

pub fn encrypt<R: RngCore + CryptoRng>(
    plaintext: &[u8],
    receiver_public: &[u8],
    auth_secret: &[u8],
    rng: &mut R,
) -> Result<EncryptedPayload, DispatchError> {
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(DispatchError::KeyAgreement(format!(
            "auth secret must be {AUTH_SECRET_LEN} bytes, got {}",
            auth_secret.len()
        )));
    }
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(DispatchError::Encryption(format!(
            "payload of {} bytes exceeds the {MAX_PLAINTEXT_LEN} byte limit",
            plaintext.len()
        )));
    }

    let ephemeral = EphemeralKeyPair::generate(rng);
    let shared_secret = ephemeral.shared_secret(receiver_public)?;
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let keys = derive_content_keys(
        &shared_secret,
        auth_secret,
        &salt,
        receiver_public,
        ephemeral.public_raw(),
    );
    let ciphertext = seal(&keys, &pad(plaintext))?;

    Ok(EncryptedPayload {
        salt,
        sender_public: *ephemeral.public_raw(),
        ciphertext,
    })
}

/// Receiver side of [`encrypt`]; returns the padded plaintext.
#[cfg(test)]
pub(crate) fn open(
    ciphertext: &[u8],
    salt: &[u8],
    sender_public: &[u8],
    receiver_secret: &p256::SecretKey,
    auth_secret: &[u8],
) -> Result<Vec<u8>, DispatchError> {
    use crate::crypto::ecdh::{derive_shared_secret, encode_public_key};

    let mut salt_bytes = [0u8; SALT_LEN];
    if salt.len() != SALT_LEN {
        return Err(DispatchError::Encryption("malformed salt".to_string()));
    }
    salt_bytes.copy_from_slice(salt);
    let receiver_public = encode_public_key(&receiver_secret.public_key());

    let shared_secret = derive_shared_secret(receiver_secret, sender_public)?;
    let keys = derive_content_keys(
        &shared_secret,
        auth_secret,
        &salt_bytes,
        &receiver_public,
        sender_public,
    );
    let cipher = Aes128Gcm::new_from_slice(&keys.cek)
        .map_err(|_| DispatchError::Encryption("invalid content encryption key".to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(&keys.nonce), ciphertext)
        .map_err(|_| DispatchError::Encryption("AES-GCM decryption failed".to_string()))
}

/// Opens a framed [`EncryptedPayload::record`].
#[cfg(test)]
pub(crate) fn open_record(
    record: &[u8],
    receiver_secret: &p256::SecretKey,
    auth_secret: &[u8],
) -> Result<Vec<u8>, DispatchError> {
    if record.len() < HEADER_LEN + TAG_LEN || record[SALT_LEN + 4] as usize != PUBLIC_KEY_LEN {
        return Err(DispatchError::Encryption("malformed record".to_string()));
    }
    open(
        &record[HEADER_LEN..],
        &record[..SALT_LEN],
        &record[SALT_LEN + 5..HEADER_LEN],
        receiver_secret,
        auth_secret,
    )
}
