use std::time::Duration;

use time::OffsetDateTime;

use crate::error::DispatchError;
use crate::ports;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}

pub(crate) fn http_client() -> Result<reqwest::Client, DispatchError> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DispatchError::Client)
}

/// Splits a push-service response into the status and a parsed body.
/// Non-2xx responses become `Delivery` errors carrying both.
pub(crate) async fn read_response(
    response: reqwest::Response,
) -> Result<(u16, Option<serde_json::Value>), DispatchError> {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body = parse_body(&text);
    if status.is_success() {
        return Ok((status.as_u16(), body));
    }
    Err(DispatchError::Delivery {
        status: Some(status.as_u16()),
        message: format!("push service returned HTTP {}", status.as_u16()),
        response: body,
    })
}

fn parse_body(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str(trimmed)
            .unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string())),
    )
}
