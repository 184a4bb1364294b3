use crate::config;
use crate::dispatch::pool;
use crate::error::DispatchError;
use crate::ports;
use crate::types::dispatch::{Channel, DispatchResult, RecipientOutcome};
use crate::types::push::{DeviceToken, NotificationMessage, ServiceAccountCredential};

pub mod legacy;
pub mod oauth;
pub mod v1;

use tokio_util::sync::CancellationToken;

pub use legacy::{BatchReport, FcmLegacyClient, MAX_REGISTRATION_IDS};
pub use oauth::{AccessToken, OAuthClient};
pub use v1::FcmV1Client;

pub const DEFAULT_BASE_URL: &str = "https://fcm.googleapis.com";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone)]
pub enum ServiceAccountStatus {
    Missing,
    Incomplete,
    Ready(ServiceAccountCredential),
}

pub fn load_service_account(config: &config::AppConfig) -> ServiceAccountStatus {
    let project_id = non_blank(config.fcm_project_id.as_deref());
    let client_email = non_blank(config.fcm_client_email.as_deref());
    let private_key = non_blank(config.fcm_private_key.as_deref());
    let has_any = project_id.is_some() || client_email.is_some() || private_key.is_some();

    match (project_id, client_email, private_key) {
        (Some(project_id), Some(client_email), Some(private_key)) => {
            let token_uri = non_blank(Some(config.fcm_token_uri.as_str())).unwrap_or(DEFAULT_TOKEN_URI);
            ServiceAccountStatus::Ready(ServiceAccountCredential {
                project_id: project_id.to_string(),
                client_email: client_email.to_string(),
                private_key: private_key.to_string(),
                token_uri: token_uri.to_string(),
            })
        }
        _ if has_any => ServiceAccountStatus::Incomplete,
        _ => ServiceAccountStatus::Missing,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Fetches one access token, then sends one request per device token.
/// Without a token nothing is sent and every device fails.
pub(crate) async fn dispatch_v1<T: ports::TimeProvider>(
    client: &FcmV1Client<T>,
    tokens: &[DeviceToken],
    message: &NotificationMessage,
    concurrency: usize,
    cancel: &CancellationToken,
) -> DispatchResult {
    let access_token = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DispatchError::Cancelled),
        token = client.fetch_access_token() => token,
    };
    let access_token = match access_token {
        Ok(access_token) => access_token,
        Err(err) => {
            tracing::warn!(error = %err, tokens = tokens.len(), "fcm v1 send skipped");
            return DispatchResult::from_outcomes(Channel::FcmV1, abandon(tokens, &err));
        }
    };

    let outcomes = pool::fan_out(
        tokens,
        concurrency,
        cancel,
        |token| client.deliver(&access_token, token, message),
        |token| RecipientOutcome::cancelled(token),
    )
    .await;
    DispatchResult::from_outcomes(Channel::FcmV1, outcomes)
}

fn abandon(tokens: &[DeviceToken], err: &DispatchError) -> Vec<RecipientOutcome> {
    tokens
        .iter()
        .map(|token| match err {
            DispatchError::Cancelled => RecipientOutcome::cancelled(token),
            DispatchError::TokenAcquisition(reason) => {
                RecipientOutcome::failed(token, DispatchError::TokenAcquisition(reason.clone()))
            }
            other => RecipientOutcome::failed(token, DispatchError::TokenAcquisition(other.to_string())),
        })
        .collect()
}

/// Splits tokens into batches of [`MAX_REGISTRATION_IDS`], one request each.
pub(crate) async fn dispatch_legacy(
    client: &FcmLegacyClient,
    tokens: &[DeviceToken],
    message: &NotificationMessage,
    concurrency: usize,
    cancel: &CancellationToken,
) -> DispatchResult {
    let mut reports = pool::fan_out(
        tokens.chunks(MAX_REGISTRATION_IDS).enumerate(),
        concurrency,
        cancel,
        |(index, batch)| client.send_batch(index, batch, message),
        |(index, batch)| BatchReport::cancelled(index, batch.len()),
    )
    .await;
    reports.sort_by_key(|report| report.index);

    let mut result = DispatchResult::new(Channel::FcmLegacy, tokens.len());
    for report in reports {
        result.record_batch(report.outcome, report.success, report.failure);
    }
    result
}
