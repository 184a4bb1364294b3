use crate::error::DispatchError;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::{CryptoRng, RngCore};

pub const PUBLIC_KEY_LEN: usize = 65;
pub const SHARED_SECRET_LEN: usize = 32;

/// Single-use P-256 key pair; one is generated for every encrypted message.
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public_raw: [u8; PUBLIC_KEY_LEN],
}

impl EphemeralKeyPair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret(SecretKey::random(rng))
    }

    pub(crate) fn from_secret(secret: SecretKey) -> Self {
        let public_raw = encode_public_key(&secret.public_key());
        Self { secret, public_raw }
    }

    pub fn public_raw(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_raw
    }

    pub fn shared_secret(&self, peer_public_raw: &[u8]) -> Result<[u8; SHARED_SECRET_LEN], DispatchError> {
        derive_shared_secret(&self.secret, peer_public_raw)
    }
}

pub fn derive_shared_secret(
    secret: &SecretKey,
    peer_public_raw: &[u8],
) -> Result<[u8; SHARED_SECRET_LEN], DispatchError> {
    let peer = parse_public_key(peer_public_raw)?;
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
    let mut out = [0u8; SHARED_SECRET_LEN];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Ok(out)
}

/// Accepts only the 65-byte uncompressed SEC1 form.
pub fn parse_public_key(raw: &[u8]) -> Result<PublicKey, DispatchError> {
    if raw.len() != PUBLIC_KEY_LEN {
        return Err(DispatchError::KeyAgreement(format!(
            "public key must be {PUBLIC_KEY_LEN} bytes, got {}",
            raw.len()
        )));
    }
    if raw[0] != 0x04 {
        return Err(DispatchError::KeyAgreement(format!(
            "public key must be an uncompressed point, got prefix 0x{:02x}",
            raw[0]
        )));
    }
    PublicKey::from_sec1_bytes(raw)
        .map_err(|_| DispatchError::KeyAgreement("public key is not a point on P-256".to_string()))
}

pub fn encode_public_key(public: &PublicKey) -> [u8; PUBLIC_KEY_LEN] {
    let point = public.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LEN];
    out.copy_from_slice(point.as_bytes());
    out
}
