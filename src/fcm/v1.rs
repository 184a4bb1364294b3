use std::time::Duration;

use serde_json::json;

use crate::adapters;
use crate::error::DispatchError;
use crate::fcm::oauth::{AccessToken, OAuthClient};
use crate::ports;
use crate::types::dispatch::RecipientOutcome;
use crate::types::push::{NotificationMessage, ServiceAccountCredential};

pub fn send_url(base_url: &str, project_id: &str) -> String {
    format!(
        "{}/v1/projects/{project_id}/messages:send",
        base_url.trim_end_matches('/')
    )
}

/// One JSON envelope per device token.
pub fn envelope(token: &str, message: &NotificationMessage) -> serde_json::Value {
    json!({
        "message": {
            "token": token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
        }
    })
}

#[derive(Clone)]
pub struct FcmV1Client<T> {
    http: reqwest::Client,
    oauth: OAuthClient<T>,
    send_url: String,
    timeout: Duration,
}

impl<T> FcmV1Client<T>
where
    T: ports::TimeProvider,
{
    pub fn new(
        http: reqwest::Client,
        credential: &ServiceAccountCredential,
        base_url: &str,
        time: T,
        timeout: Duration,
    ) -> Self {
        let oauth = OAuthClient::new(http.clone(), credential, time, timeout);
        Self {
            http,
            oauth,
            send_url: send_url(base_url, &credential.project_id),
            timeout,
        }
    }

    pub async fn fetch_access_token(&self) -> Result<AccessToken, DispatchError> {
        self.oauth.fetch_access_token().await
    }

    pub async fn deliver(
        &self,
        access_token: &AccessToken,
        token: &str,
        message: &NotificationMessage,
    ) -> RecipientOutcome {
        match self.send(access_token, token, message).await {
            Ok((status, response)) => RecipientOutcome::delivered(token, status, response),
            Err(err) => RecipientOutcome::failed(token, err),
        }
    }

    async fn send(
        &self,
        access_token: &AccessToken,
        token: &str,
        message: &NotificationMessage,
    ) -> Result<(u16, Option<serde_json::Value>), DispatchError> {
        let response = self
            .http
            .post(&self.send_url)
            .timeout(self.timeout)
            .bearer_auth(access_token.secret())
            .json(&envelope(token, message))
            .send()
            .await
            .map_err(|err| DispatchError::delivery(None, format!("request failed: {err}")))?;
        adapters::read_response(response).await
    }
}
