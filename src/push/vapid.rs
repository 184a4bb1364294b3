use jwt_simple::prelude::ES256KeyPair;
use p256::SecretKey;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use reqwest::Url;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::config;
use crate::crypto::ecdh::{PUBLIC_KEY_LEN, encode_public_key};
use crate::crypto::{decode_base64url, der, encode_base64url};
use crate::error::DispatchError;
use crate::types::push::VapidConfig;

/// Lifetime of a VAPID token; push services reject anything over 24h.
pub const TOKEN_LIFETIME: Duration = Duration::hours(12);

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

pub fn load_vapid_config(config: &config::AppConfig) -> VapidConfigStatus {
    let private_key = non_blank(config.vapid_private_key.as_deref());
    let public_key = non_blank(config.vapid_public_key.as_deref());
    let subject = non_blank(config.vapid_subject.as_deref());
    let has_any = private_key.is_some() || public_key.is_some() || subject.is_some();

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            VapidConfigStatus::Ready(VapidConfig {
                private_key: private_key.to_string(),
                public_key: public_key.to_string(),
                subject: subject.to_string(),
            })
        }
        _ if has_any => VapidConfigStatus::Incomplete,
        _ => VapidConfigStatus::Missing,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, DispatchError> {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, DispatchError> {
    let key_pair = generate_es256_keypair_with_rng(rng);
    let secret = SecretKey::from_slice(&key_pair.to_bytes())
        .map_err(|_| DispatchError::Signing("generated an invalid VAPID private key".to_string()))?;
    let private_key = encode_base64url(&key_pair.to_bytes());
    let public_key = encode_base64url(&encode_public_key(&secret.public_key()));

    // Round-trip through the signer so a broken pair never reaches an operator.
    let signer = VapidSigner::new(&VapidConfig {
        private_key: private_key.clone(),
        public_key: public_key.clone(),
        subject: "mailto:init@localhost".to_string(),
    })?;

    Ok(VapidCredentials {
        private_key,
        public_key: signer.public_key().to_string(),
    })
}

fn generate_es256_keypair_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> ES256KeyPair {
    let mut key_bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut key_bytes);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&key_bytes) {
            return key_pair;
        }
    }
}

#[derive(Serialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

/// Application-server identity used to sign VAPID tokens.
pub struct VapidSigner {
    signing_key: SigningKey,
    public_key: String,
    subject: String,
}

impl std::fmt::Debug for VapidSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidSigner")
            .field("public_key", &self.public_key)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl VapidSigner {
    /// The raw private scalar is wrapped into a SEC1 PEM before parsing,
    /// which also validates it against the configured public key.
    pub fn new(vapid: &VapidConfig) -> Result<Self, DispatchError> {
        let scalar: [u8; der::SCALAR_LEN] = decode_base64url(&vapid.private_key)
            .ok_or_else(|| DispatchError::Signing("VAPID private key is not valid base64".into()))?
            .try_into()
            .map_err(|_| {
                DispatchError::Signing(format!("VAPID private key must be {} bytes", der::SCALAR_LEN))
            })?;
        let public_raw: [u8; PUBLIC_KEY_LEN] = decode_base64url(&vapid.public_key)
            .ok_or_else(|| DispatchError::Signing("VAPID public key is not valid base64".into()))?
            .try_into()
            .map_err(|_| {
                DispatchError::Signing(format!("VAPID public key must be {PUBLIC_KEY_LEN} bytes"))
            })?;

        let pem = der::ec_private_key_pem(&scalar, &public_raw);
        let secret = SecretKey::from_sec1_pem(&pem)
            .map_err(|err| DispatchError::Signing(format!("invalid VAPID private key: {err}")))?;
        if encode_public_key(&secret.public_key()) != public_raw {
            return Err(DispatchError::Signing(
                "VAPID public key does not match the private key".into(),
            ));
        }

        Ok(Self {
            signing_key: SigningKey::from(&secret),
            public_key: encode_base64url(&public_raw),
            subject: vapid.subject.trim().to_string(),
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Compact ES256 JWT for the push service that owns `endpoint`.
    pub fn sign(&self, endpoint: &Url, now: OffsetDateTime) -> Result<String, DispatchError> {
        let audience = audience(endpoint)?;
        let header = serde_json::to_vec(&JwtHeader {
            typ: "JWT",
            alg: "ES256",
        })
        .map_err(|err| DispatchError::Signing(err.to_string()))?;
        let claims = serde_json::to_vec(&VapidClaims {
            aud: &audience,
            exp: (now + TOKEN_LIFETIME).unix_timestamp(),
            sub: &self.subject,
        })
        .map_err(|err| DispatchError::Signing(err.to_string()))?;

        let signing_input = format!("{}.{}", encode_base64url(&header), encode_base64url(&claims));
        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        let raw = der::signature_to_raw(signature.to_der().as_bytes())
            .map_err(|err| DispatchError::Signing(format!("malformed ECDSA signature: {err}")))?;

        Ok(format!("{signing_input}.{}", encode_base64url(&raw)))
    }

    pub fn authorization(&self, token: &str) -> String {
        format!("WebPush {token}")
    }

    pub fn crypto_key(&self, sender_public: &[u8]) -> String {
        format!(
            "dh={};p256ecdsa={}",
            encode_base64url(sender_public),
            self.public_key
        )
    }
}

/// Origin of the push service: scheme and host, plus the port when it is
/// not the scheme default.
pub fn audience(endpoint: &Url) -> Result<String, DispatchError> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| DispatchError::Signing(format!("endpoint {endpoint} has no host")))?;
    Ok(match endpoint.port() {
        Some(port) => format!("{}://{host}:{port}", endpoint.scheme()),
        None => format!("{}://{host}", endpoint.scheme()),
    })
}

#[cfg(test)]
#[allow(non_snake_case)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use p256::ecdsa::VerifyingKey;
    use p256::ecdsa::signature::Verifier;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    pub(crate) fn fixture_config() -> VapidConfig {
        let mut rng = StdRng::from_seed([7u8; 32]);
        let credentials = generate_vapid_credentials_with_rng(&mut rng).expect("credentials");
        VapidConfig {
            private_key: credentials.private_key,
            public_key: credentials.public_key,
            subject: "mailto:ops@example.com".to_string(),
        }
    }

    fn decode_segment(segment: &str) -> serde_json::Value {
        let bytes = decode_base64url(segment).expect("segment base64");
        serde_json::from_slice(&bytes).expect("segment json")
    }

    #[test]
    fn generate_vapid_credentials_with_rng__should_return_expected_fixture() {
        // Given
        let seed = [7u8; 32];
        let mut rng = StdRng::from_seed(seed);

        // When
        let credentials =
            generate_vapid_credentials_with_rng(&mut rng).expect("credentials should generate");

        // Then
        assert_eq!(
            credentials.private_key,
            "9pKJeIXAyyCj5M0QagsVvDYHlPF-cymJCbB5iHPsdEE"
        );
        assert_eq!(
            credentials.public_key,
            "BCRweRf_U5iQM4pKNucGRzM6OuLp8Hisa8yX0N2ePIf1oxKitvFT6qvuGgYoTxlMatMDaytXbZR3rVClc2w_p6U"
        );
    }

    #[test]
    fn load_vapid_config__should_report_partial_configuration() {
        // Given
        let config = config::AppConfig {
            vapid_public_key: Some("public".to_string()),
            vapid_subject: Some(" ".to_string()),
            ..config::AppConfig::default()
        };

        // Then
        assert!(matches!(
            load_vapid_config(&config),
            VapidConfigStatus::Incomplete
        ));
        assert!(matches!(
            load_vapid_config(&config::AppConfig::default()),
            VapidConfigStatus::Missing
        ));
    }

    #[test]
    fn sign__should_produce_verifiable_es256_token() {
        // Given
        let signer = VapidSigner::new(&fixture_config()).expect("signer");
        let endpoint = Url::parse("https://fcm.googleapis.com/fcm/send/abc").expect("url");
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");

        // When
        let token = signer.sign(&endpoint, now).expect("sign");

        // Then
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let header = decode_segment(parts[0]);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["typ"], "JWT");
        let claims = decode_segment(parts[1]);
        assert_eq!(claims["aud"], "https://fcm.googleapis.com");
        assert_eq!(claims["sub"], "mailto:ops@example.com");
        assert_eq!(claims["exp"], 1_700_000_000 + 12 * 3600);

        let raw = decode_base64url(parts[2]).expect("signature base64");
        assert_eq!(raw.len(), der::RAW_SIGNATURE_LEN);
        let public = decode_base64url(signer.public_key()).expect("public key");
        let verifying_key = VerifyingKey::from_sec1_bytes(&public).expect("verifying key");
        let signature = Signature::from_slice(&raw).expect("signature");
        verifying_key
            .verify(format!("{}.{}", parts[0], parts[1]).as_bytes(), &signature)
            .expect("signature should verify");
    }

    #[test]
    fn new__should_reject_mismatched_public_key() {
        // Given
        let mut other_rng = StdRng::from_seed([9u8; 32]);
        let other = generate_vapid_credentials_with_rng(&mut other_rng).expect("credentials");
        let vapid = VapidConfig {
            public_key: other.public_key,
            ..fixture_config()
        };

        // When
        let err = VapidSigner::new(&vapid).expect_err("mismatch");

        // Then
        assert_eq!(err.kind(), ErrorKind::Signing);
    }

    #[test]
    fn new__should_reject_malformed_private_key() {
        // Given
        let vapid = VapidConfig {
            private_key: "c2hvcnQ".to_string(),
            ..fixture_config()
        };

        // Then
        assert!(matches!(
            VapidSigner::new(&vapid),
            Err(DispatchError::Signing(_))
        ));
    }

    #[test]
    fn audience__should_keep_non_default_port() {
        // Given
        let custom = Url::parse("http://127.0.0.1:8080/push/1").expect("url");
        let default = Url::parse("https://updates.push.services.mozilla.com:443/wpush/v2/x")
            .expect("url");

        // Then
        assert_eq!(audience(&custom).expect("aud"), "http://127.0.0.1:8080");
        assert_eq!(
            audience(&default).expect("aud"),
            "https://updates.push.services.mozilla.com"
        );
    }

    #[test]
    fn crypto_key__should_list_dh_and_signing_key() {
        // Given
        let signer = VapidSigner::new(&fixture_config()).expect("signer");

        // When
        let header = signer.crypto_key(&[0xfb, 0xff]);

        // Then
        assert_eq!(header, format!("dh=-_8;p256ecdsa={}", signer.public_key()));
        assert_eq!(signer.authorization("t"), "WebPush t");
    }
}
