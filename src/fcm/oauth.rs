use std::sync::Arc;
use std::time::Duration;

use jwt_simple::prelude::{Claims, Duration as JwtDuration, RS256KeyPair, RSAKeyPairLike};
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::ports;
use crate::types::push::ServiceAccountCredential;

pub const FIREBASE_MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ScopeClaims {
    pub(crate) scope: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Short-lived OAuth bearer token for the FCM v1 API.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Exchanges a signed service-account assertion for an access token.
///
/// A private key that fails to parse does not stop construction; every
/// assertion then fails, so the v1 channel reports token acquisition errors
/// while the other channels keep working.
#[derive(Clone)]
pub struct OAuthClient<T> {
    http: reqwest::Client,
    client_email: String,
    token_uri: String,
    key_pair: Result<Arc<RS256KeyPair>, String>,
    time: T,
    timeout: Duration,
}

impl<T> OAuthClient<T>
where
    T: ports::TimeProvider,
{
    pub fn new(
        http: reqwest::Client,
        credential: &ServiceAccountCredential,
        time: T,
        timeout: Duration,
    ) -> Self {
        let key_pair = RS256KeyPair::from_pem(&credential.private_key)
            .map(Arc::new)
            .map_err(|err| format!("invalid service account private key: {err}"));
        if let Err(reason) = &key_pair {
            tracing::error!(client_email = %credential.client_email, "{reason}");
        }
        Self {
            http,
            client_email: credential.client_email.clone(),
            token_uri: credential.token_uri.clone(),
            key_pair,
            time,
            timeout,
        }
    }

    /// RS256 JWT asserting the service account identity for one hour.
    pub fn assertion(&self) -> Result<String, DispatchError> {
        let key_pair = self
            .key_pair
            .as_ref()
            .map_err(|reason| DispatchError::Signing(reason.clone()))?;
        let now = self.time.now().unix_timestamp().max(0) as u64;
        let mut claims = Claims::with_custom_claims(
            ScopeClaims {
                scope: FIREBASE_MESSAGING_SCOPE.to_string(),
            },
            JwtDuration::from_secs(ASSERTION_LIFETIME_SECS),
        )
        .with_issuer(&self.client_email)
        .with_audience(&self.token_uri);
        claims.issued_at = Some(JwtDuration::from_secs(now));
        claims.expires_at = Some(JwtDuration::from_secs(now + ASSERTION_LIFETIME_SECS));
        claims.invalid_before = None;

        key_pair
            .sign(claims)
            .map_err(|err| DispatchError::Signing(format!("failed to sign assertion: {err}")))
    }

    pub async fn fetch_access_token(&self) -> Result<AccessToken, DispatchError> {
        let assertion = self
            .assertion()
            .map_err(|err| DispatchError::TokenAcquisition(err.to_string()))?;
        let response = self
            .http
            .post(&self.token_uri)
            .timeout(self.timeout)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|err| DispatchError::TokenAcquisition(format!("request failed: {err}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DispatchError::TokenAcquisition(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }
        let body: TokenResponse = response.json().await.map_err(|err| {
            DispatchError::TokenAcquisition(format!("unreadable token response: {err}"))
        })?;
        body.access_token
            .filter(|token| !token.is_empty())
            .map(AccessToken)
            .ok_or_else(|| {
                DispatchError::TokenAcquisition("token response has no access_token".into())
            })
    }
}
