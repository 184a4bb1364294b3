use crate::error::{DispatchError, ErrorKind};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    WebPush,
    FcmV1,
    FcmLegacy,
    None,
}

impl Channel {
    pub fn label(self) -> &'static str {
        match self {
            Channel::WebPush => "web-push",
            Channel::FcmV1 => "fcm-v1",
            Channel::FcmLegacy => "fcm-legacy",
            Channel::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of one outbound call. For Web Push and FCM v1 that is one
/// recipient; for the legacy API it is one batch request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub gone: bool,
}

impl RecipientOutcome {
    pub fn delivered(
        recipient: impl Into<String>,
        status: u16,
        response: Option<serde_json::Value>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            status: Some(status),
            error: None,
            response,
            gone: false,
        }
    }

    pub fn failed(recipient: impl Into<String>, err: DispatchError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let (status, response) = match err {
            DispatchError::Delivery {
                status, response, ..
            } => (status, response),
            _ => (None, None),
        };
        Self {
            recipient: recipient.into(),
            status,
            error: Some(Diagnostic { kind, message }),
            response,
            gone: matches!(status, Some(404) | Some(410)),
        }
    }

    pub fn cancelled(recipient: impl Into<String>) -> Self {
        Self::failed(recipient, DispatchError::Cancelled)
    }

    pub(crate) fn unroutable(recipient: impl Into<String>, reason: &str) -> Self {
        Self {
            recipient: recipient.into(),
            status: None,
            error: Some(Diagnostic {
                kind: ErrorKind::NoChannel,
                message: reason.to_string(),
            }),
            response: None,
            gone: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchResult {
    pub channel: Channel,
    pub requested: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub outcomes: Vec<RecipientOutcome>,
}

impl DispatchResult {
    pub fn new(channel: Channel, requested: usize) -> Self {
        Self {
            channel,
            requested,
            success_count: 0,
            failure_count: 0,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn from_outcomes(channel: Channel, outcomes: Vec<RecipientOutcome>) -> Self {
        let mut result = Self::new(channel, outcomes.len());
        for outcome in outcomes {
            result.record(outcome);
        }
        result
    }

    pub(crate) fn record(&mut self, outcome: RecipientOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Records a request that covered several recipients at once.
    pub(crate) fn record_batch(
        &mut self,
        outcome: RecipientOutcome,
        success_count: usize,
        failure_count: usize,
    ) {
        self.success_count += success_count;
        self.failure_count += failure_count;
        self.outcomes.push(outcome);
    }

    pub fn is_balanced(&self) -> bool {
        self.success_count + self.failure_count == self.requested
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn from_outcomes__should_count_successes_and_failures() {
        // Given
        let outcomes = vec![
            RecipientOutcome::delivered("a", 201, None),
            RecipientOutcome::failed("b", DispatchError::delivery(Some(500), "HTTP 500")),
            RecipientOutcome::cancelled("c"),
        ];

        // When
        let result = DispatchResult::from_outcomes(Channel::WebPush, outcomes);

        // Then
        assert_eq!(result.requested, 3);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 2);
        assert!(result.is_balanced());
        assert_eq!(result.failures().count(), 2);
    }

    #[test]
    fn failed__should_flag_gone_subscriptions() {
        // When
        let outcome =
            RecipientOutcome::failed("https://push.example/1", DispatchError::delivery(Some(410), "HTTP 410"));

        // Then
        assert!(outcome.gone);
        assert_eq!(outcome.status, Some(410));
        assert_eq!(
            outcome.error.as_ref().map(|error| error.kind),
            Some(ErrorKind::Delivery)
        );
    }

    #[test]
    fn dispatch_result__should_serialize_channel_in_kebab_case() {
        // Given
        let result = DispatchResult::new(Channel::FcmLegacy, 0);

        // When
        let value = serde_json::to_value(&result).expect("serialize result");

        // Then
        assert_eq!(value["channel"], "fcm-legacy");
        assert_eq!(Channel::FcmV1.label(), "fcm-v1");
    }
}
