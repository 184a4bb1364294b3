use std::time::Duration;

use serde_json::json;

use crate::adapters;
use crate::error::{DispatchError, ErrorKind};
use crate::types::dispatch::{Diagnostic, RecipientOutcome};
use crate::types::push::{DeviceToken, NotificationMessage};

/// Upper bound the legacy endpoint accepts for `registration_ids`.
pub const MAX_REGISTRATION_IDS: usize = 1000;

pub fn send_url(base_url: &str) -> String {
    format!("{}/fcm/send", base_url.trim_end_matches('/'))
}

pub fn batch_body(tokens: &[DeviceToken], message: &NotificationMessage) -> serde_json::Value {
    json!({
        "registration_ids": tokens,
        "notification": {
            "title": message.title,
            "body": message.body,
        },
        "data": message.data,
    })
}

/// Per-token counts reported by the service, clamped to the batch size.
/// Missing or non-numeric `success` yields `None`.
pub fn tally(batch_len: usize, body: &serde_json::Value) -> Option<(usize, usize)> {
    let success = body.get("success")?.as_u64()?;
    let success = usize::try_from(success).unwrap_or(usize::MAX).min(batch_len);
    Some((success, batch_len - success))
}

/// Result of one batch request: the request outcome plus per-token counts.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub index: usize,
    pub outcome: RecipientOutcome,
    pub success: usize,
    pub failure: usize,
}

impl BatchReport {
    fn failed(index: usize, len: usize, err: DispatchError) -> Self {
        Self {
            index,
            outcome: RecipientOutcome::failed(batch_label(index, len), err),
            success: 0,
            failure: len,
        }
    }

    pub(crate) fn cancelled(index: usize, len: usize) -> Self {
        Self::failed(index, len, DispatchError::Cancelled)
    }
}

pub fn batch_label(index: usize, len: usize) -> String {
    format!("batch {} ({len} tokens)", index + 1)
}

#[derive(Debug, Clone)]
pub struct FcmLegacyClient {
    http: reqwest::Client,
    server_key: String,
    send_url: String,
    timeout: Duration,
}

impl FcmLegacyClient {
    pub fn new(http: reqwest::Client, server_key: String, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            server_key,
            send_url: send_url(base_url),
            timeout,
        }
    }

    pub async fn send_batch(
        &self,
        index: usize,
        tokens: &[DeviceToken],
        message: &NotificationMessage,
    ) -> BatchReport {
        let len = tokens.len();
        let (status, body) = match self.post(tokens, message).await {
            Ok(response) => response,
            Err(err) => return BatchReport::failed(index, len, err),
        };
        let Some((success, failure)) = body.as_ref().and_then(|body| tally(len, body)) else {
            return BatchReport::failed(
                index,
                len,
                DispatchError::Delivery {
                    status: Some(status),
                    message: "response has no success counter".to_string(),
                    response: body,
                },
            );
        };

        let mut outcome = RecipientOutcome::delivered(batch_label(index, len), status, body);
        if failure > 0 {
            outcome.error = Some(Diagnostic {
                kind: ErrorKind::Delivery,
                message: format!("{failure} of {len} registration ids rejected"),
            });
        }
        BatchReport {
            index,
            outcome,
            success,
            failure,
        }
    }

    async fn post(
        &self,
        tokens: &[DeviceToken],
        message: &NotificationMessage,
    ) -> Result<(u16, Option<serde_json::Value>), DispatchError> {
        let response = self
            .http
            .post(&self.send_url)
            .timeout(self.timeout)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&batch_body(tokens, message))
            .send()
            .await
            .map_err(|err| DispatchError::delivery(None, format!("request failed: {err}")))?;
        adapters::read_response(response).await
    }
}
