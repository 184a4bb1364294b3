use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use reqwest::Url;

use crate::adapters;
use crate::crypto::{decode_base64url, ece, encode_base64url};
use crate::error::DispatchError;
use crate::ports;
use crate::push::vapid::VapidSigner;
use crate::types::dispatch::RecipientOutcome;
use crate::types::push::{NotificationMessage, PushSubscription};

/// A fully encrypted and signed Web Push request, ready to send.
#[derive(Debug)]
pub(crate) struct PreparedRequest {
    pub(crate) url: Url,
    pub(crate) headers: Vec<(&'static str, String)>,
    pub(crate) body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct WebPushClient<T> {
    http: reqwest::Client,
    signer: Arc<VapidSigner>,
    time: T,
    ttl: u32,
    timeout: Duration,
}

impl<T> WebPushClient<T>
where
    T: ports::TimeProvider,
{
    pub fn new(
        http: reqwest::Client,
        signer: VapidSigner,
        time: T,
        ttl: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            signer: Arc::new(signer),
            time,
            ttl,
            timeout,
        }
    }

    pub fn public_key(&self) -> &str {
        self.signer.public_key()
    }

    /// Sends one notification. Every failure is folded into the outcome.
    pub async fn deliver(
        &self,
        subscription: &PushSubscription,
        message: &NotificationMessage,
    ) -> RecipientOutcome {
        match self.send(subscription, message).await {
            Ok((status, response)) => {
                tracing::debug!(endpoint = %subscription.endpoint, status, "web push delivered");
                RecipientOutcome::delivered(&subscription.endpoint, status, response)
            }
            Err(err) => RecipientOutcome::failed(&subscription.endpoint, err),
        }
    }

    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &NotificationMessage,
    ) -> Result<(u16, Option<serde_json::Value>), DispatchError> {
        let prepared = self.prepare(subscription, message, &mut OsRng)?;
        let mut request = self
            .http
            .post(prepared.url)
            .timeout(self.timeout)
            .body(prepared.body);
        for (name, value) in prepared.headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|err| DispatchError::delivery(None, format!("request failed: {err}")))?;
        adapters::read_response(response).await
    }

    pub(crate) fn prepare<R: RngCore + CryptoRng>(
        &self,
        subscription: &PushSubscription,
        message: &NotificationMessage,
        rng: &mut R,
    ) -> Result<PreparedRequest, DispatchError> {
        let url = Url::parse(subscription.endpoint.trim()).map_err(|err| {
            DispatchError::delivery(None, format!("invalid endpoint {}: {err}", subscription.endpoint))
        })?;
        let receiver_public = decode_base64url(&subscription.p256dh)
            .ok_or_else(|| DispatchError::KeyAgreement("p256dh is not valid base64".into()))?;
        let auth = decode_base64url(&subscription.auth)
            .ok_or_else(|| DispatchError::KeyAgreement("auth secret is not valid base64".into()))?;
        let plaintext = serde_json::to_vec(message)
            .map_err(|err| DispatchError::Encryption(format!("failed to serialize message: {err}")))?;

        let payload = ece::encrypt(&plaintext, &receiver_public, &auth, rng)?;
        let token = self.signer.sign(&url, self.time.now())?;

        let headers = vec![
            ("Content-Type", "application/octet-stream".to_string()),
            ("Content-Encoding", "aesgcm".to_string()),
            ("TTL", self.ttl.to_string()),
            ("Authorization", self.signer.authorization(&token)),
            ("Crypto-Key", self.signer.crypto_key(&payload.sender_public)),
            ("Encryption", format!("salt={}", encode_base64url(&payload.salt))),
        ];

        Ok(PreparedRequest {
            url,
            headers,
            body: payload.ciphertext,
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::TokioTimeProvider;
    use crate::crypto::ecdh::encode_public_key;
    use crate::error::ErrorKind;
    use crate::push::vapid::tests::fixture_config;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Browser {
        secret: p256::SecretKey,
        auth: [u8; 16],
    }

    impl Browser {
        fn new() -> Self {
            let secret = p256::SecretKey::from_slice(&[0x2a; 32]).expect("browser key");
            Self {
                secret,
                auth: [0x11; 16],
            }
        }

        fn subscription(&self, endpoint: &str) -> PushSubscription {
            PushSubscription::new(
                endpoint,
                encode_base64url(&encode_public_key(&self.secret.public_key())),
                encode_base64url(&self.auth),
            )
        }

        fn open(&self, body: &[u8], encryption: &str, crypto_key: &str) -> NotificationMessage {
            let (salt, dh) = salt_and_dh(encryption, crypto_key);
            let padded = ece::open(body, &salt, &dh, &self.secret, &self.auth).expect("decrypt");
            let pad_len = u16::from_be_bytes([padded[0], padded[1]]) as usize;
            serde_json::from_slice(&padded[2 + pad_len..]).expect("message json")
        }

        fn open_prepared(&self, prepared: &PreparedRequest) -> NotificationMessage {
            self.open(
                &prepared.body,
                header_value(prepared, "Encryption"),
                header_value(prepared, "Crypto-Key"),
            )
        }

        fn open_received(&self, request: &wiremock::Request) -> NotificationMessage {
            let header = |name: &str| {
                request
                    .headers
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .expect("header present")
                    .to_string()
            };
            self.open(&request.body, &header("Encryption"), &header("Crypto-Key"))
        }
    }

    fn salt_and_dh(encryption: &str, crypto_key: &str) -> (Vec<u8>, Vec<u8>) {
        let salt = encryption.strip_prefix("salt=").expect("salt parameter");
        let dh = crypto_key
            .split(';')
            .find_map(|part| part.strip_prefix("dh="))
            .expect("dh parameter");
        (
            decode_base64url(salt).expect("salt base64"),
            decode_base64url(dh).expect("dh base64"),
        )
    }

    fn client(ttl: u32) -> WebPushClient<TokioTimeProvider> {
        let signer = VapidSigner::new(&fixture_config()).expect("signer");
        WebPushClient::new(
            adapters::http_client().expect("http client"),
            signer,
            TokioTimeProvider,
            ttl,
            Duration::from_secs(5),
        )
    }

    fn header_value<'a>(prepared: &'a PreparedRequest, name: &str) -> &'a str {
        prepared
            .headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .expect("header present")
    }

    #[test]
    fn prepare__should_set_aesgcm_headers() {
        // Given
        let browser = Browser::new();
        let client = client(600);
        let message = NotificationMessage::new("Heron", "Seen at the pond");
        let mut rng = StdRng::from_seed([1u8; 32]);

        // When
        let prepared = client
            .prepare(&browser.subscription("https://push.example/send/1"), &message, &mut rng)
            .expect("prepare");

        // Then
        assert_eq!(header_value(&prepared, "Content-Encoding"), "aesgcm");
        assert_eq!(header_value(&prepared, "TTL"), "600");
        assert!(header_value(&prepared, "Authorization").starts_with("WebPush ey"));
        assert!(header_value(&prepared, "Crypto-Key").starts_with("dh=B"));
        assert!(
            header_value(&prepared, "Crypto-Key")
                .ends_with(&format!("p256ecdsa={}", client.public_key()))
        );
        assert!(header_value(&prepared, "Encryption").starts_with("salt="));
        assert_eq!(
            prepared.body.len(),
            ece::PADDING_LEN + serde_json::to_vec(&message).expect("json").len() + ece::TAG_LEN
        );
        assert_eq!(browser.open_prepared(&prepared), message);
    }

    #[test]
    fn prepare__should_produce_body_accepted_by_reference_aesgcm_receiver() {
        // Given
        let browser = Browser::new();
        let message = NotificationMessage::new("New sighting", "X reported");
        let mut rng = StdRng::from_seed([3u8; 32]);
        let prepared = client(60)
            .prepare(&browser.subscription("https://push.example/send/1"), &message, &mut rng)
            .expect("prepare");
        let (salt, dh) = salt_and_dh(
            header_value(&prepared, "Encryption"),
            header_value(&prepared, "Crypto-Key"),
        );
        let components = ::ece::crypto::EcKeyComponents::new(
            browser.secret.to_bytes().to_vec(),
            encode_public_key(&browser.secret.public_key()).to_vec(),
        );

        // When
        let block = ::ece::legacy::AesGcmEncryptedBlock::new(
            &dh,
            &salt,
            ece::RECORD_SIZE,
            prepared.body.clone(),
        )
        .expect("encrypted block");
        let plaintext = ::ece::legacy::decrypt_aesgcm(&components, &browser.auth, &block)
            .expect("reference decrypt");

        // Then
        assert_eq!(
            plaintext,
            br#"{"title":"New sighting","body":"X reported"}"#.to_vec()
        );
    }

    #[test]
    fn prepare__should_reject_undecodable_keys() {
        // Given
        let mut subscription = Browser::new().subscription("https://push.example/send/1");
        subscription.p256dh = "%%%".to_string();
        let mut rng = StdRng::from_seed([1u8; 32]);

        // When
        let err = client(60)
            .prepare(&subscription, &NotificationMessage::new("a", "b"), &mut rng)
            .expect_err("bad key");

        // Then
        assert_eq!(err.kind(), ErrorKind::KeyAgreement);
    }

    #[tokio::test]
    async fn deliver__should_post_encrypted_payload() {
        // Given
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send/abc"))
            .and(header("Content-Encoding", "aesgcm"))
            .and(header("TTL", "86400"))
            .and(header_exists("Authorization"))
            .and(header_exists("Crypto-Key"))
            .and(header_exists("Encryption"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let browser = Browser::new();
        let subscription = browser.subscription(&format!("{}/send/abc", server.uri()));
        let message = NotificationMessage::sighting("Fox", "Red fox by the trail", 45.0, -73.5);

        // When
        let outcome = client(86_400).deliver(&subscription, &message).await;

        // Then
        assert!(outcome.is_success());
        assert_eq!(outcome.status, Some(201));
        let requests = server.received_requests().await.expect("recorded requests");
        assert_eq!(browser.open_received(&requests[0]), message);
    }

    #[tokio::test]
    async fn deliver__should_flag_expired_subscription() {
        // Given
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(410).set_body_string("push subscription has unsubscribed or expired"))
            .mount(&server)
            .await;
        let subscription = Browser::new().subscription(&format!("{}/send/gone", server.uri()));

        // When
        let outcome = client(60)
            .deliver(&subscription, &NotificationMessage::new("a", "b"))
            .await;

        // Then
        assert!(!outcome.is_success());
        assert!(outcome.gone);
        assert_eq!(outcome.status, Some(410));
        assert_eq!(
            outcome.response,
            Some(serde_json::Value::String(
                "push subscription has unsubscribed or expired".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn deliver__should_report_unreachable_endpoint() {
        // Given
        let subscription = Browser::new().subscription("http://127.0.0.1:9/send/none");

        // When
        let outcome = client(60)
            .deliver(&subscription, &NotificationMessage::new("a", "b"))
            .await;

        // Then
        assert_eq!(
            outcome.error.map(|error| error.kind),
            Some(ErrorKind::Delivery)
        );
        assert_eq!(outcome.status, None);
    }
}
