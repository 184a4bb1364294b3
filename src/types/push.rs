use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Firebase registration token for one device.
pub type DeviceToken = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidConfig {
    pub private_key: String,
    pub public_key: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccountCredential {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_used_at: Option<OffsetDateTime>,
}

impl PushSubscription {
    pub fn new(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            p256dh: p256dh.into(),
            auth: auth.into(),
            user_agent: None,
            last_used_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl NotificationMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    /// Message announcing a sighting; coordinates travel as string data so
    /// every channel can carry them unchanged.
    pub fn sighting(title: impl Into<String>, body: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self::new(title, body)
            .with_data("lat", lat.to_string())
            .with_data("lon", lon.to_string())
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn sighting__should_carry_coordinates_as_strings() {
        // When
        let message = NotificationMessage::sighting("New sighting", "X reported", 45.5, -73.25);

        // Then
        assert_eq!(message.data.get("lat").map(String::as_str), Some("45.5"));
        assert_eq!(message.data.get("lon").map(String::as_str), Some("-73.25"));
    }

    #[test]
    fn notification_message__should_serialize_without_empty_data() {
        // Given
        let message = NotificationMessage::new("New sighting", "X reported");

        // When
        let json = serde_json::to_string(&message).expect("serialize message");

        // Then
        assert_eq!(json, r#"{"title":"New sighting","body":"X reported"}"#);
    }

    #[test]
    fn push_subscription__should_deserialize_without_optional_fields() {
        // When
        let subscription: PushSubscription = serde_json::from_str(
            r#"{"endpoint":"https://push.example/1","p256dh":"key","auth":"secret"}"#,
        )
        .expect("parse subscription");

        // Then
        assert_eq!(
            subscription,
            PushSubscription::new("https://push.example/1", "key", "secret")
        );
    }
}
