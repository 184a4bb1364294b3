use crate::state;
use crate::types::push::{NotificationMessage, PushSubscription};

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::USER_AGENT;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Serialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub(crate) public_key: String,
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: &'static str,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: &'static str) -> ApiError {
    (status, Json(ErrorResponse { error }))
}

fn not_configured() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "Push notifications are not configured.",
    )
}

pub(crate) async fn push_public_key(
    State(state): State<state::AppState>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let public_key = state
        .dispatcher
        .web_push_public_key()
        .ok_or_else(not_configured)?;
    Ok(Json(PublicKeyResponse {
        public_key: public_key.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeRequest {
    pub(crate) endpoint: String,
    pub(crate) p256dh: String,
    pub(crate) auth: String,
}

#[derive(Serialize)]
pub(crate) struct SubscribeResponse {
    pub(crate) success: bool,
    pub(crate) subscription_id: usize,
}

fn subscription_from_parts(
    endpoint: &str,
    p256dh: &str,
    auth: &str,
) -> Result<PushSubscription, ApiError> {
    let (endpoint, p256dh, auth) = (endpoint.trim(), p256dh.trim(), auth.trim());
    if endpoint.is_empty() || p256dh.is_empty() || auth.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "endpoint, p256dh, and auth are required.",
        ));
    }
    Ok(PushSubscription::new(endpoint, p256dh, auth))
}

pub(crate) async fn push_subscribe(
    State(state): State<state::AppState>,
    headers: HeaderMap,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let mut subscription =
        subscription_from_parts(&request.endpoint, &request.p256dh, &request.auth)?;
    subscription.user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let subscription_id = state
        .subscriptions
        .lock()
        .expect("push subscriptions lock")
        .upsert(subscription, OffsetDateTime::now_utc());
    tracing::info!(subscription_id, "push subscription saved");

    Ok(Json(SubscribeResponse {
        success: true,
        subscription_id,
    }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestPushRequest {
    pub(crate) endpoint: String,
    pub(crate) p256dh: String,
    pub(crate) auth: String,
    pub(crate) message: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct TestPushResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn push_test(
    State(state): State<state::AppState>,
    Json(request): Json<TestPushRequest>,
) -> Result<Json<TestPushResponse>, ApiError> {
    if state.dispatcher.web_push_public_key().is_none() {
        return Err(not_configured());
    }
    let subscription = subscription_from_parts(&request.endpoint, &request.p256dh, &request.auth)?;

    let body = request
        .message
        .as_deref()
        .unwrap_or("Test notification")
        .trim();
    if body.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "message must not be empty.",
        ));
    }

    let message = NotificationMessage::new(state.config.notification_title.as_str(), body);
    let results = state.dispatcher.dispatch(&message, &[subscription], &[]).await;
    if results.iter().any(|result| result.failure_count > 0) {
        return Err(api_error(
            StatusCode::BAD_GATEWAY,
            "Failed to send test notification.",
        ));
    }

    Ok(Json(TestPushResponse { status: "sent" }))
}
