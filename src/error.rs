use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("key agreement failed: {0}")]
    KeyAgreement(String),
    #[error("payload encryption failed: {0}")]
    Encryption(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("access token acquisition failed: {0}")]
    TokenAcquisition(String),
    #[error("delivery failed: {message}")]
    Delivery {
        status: Option<u16>,
        message: String,
        response: Option<serde_json::Value>,
    },
    #[error("dispatch cancelled before delivery completed")]
    Cancelled,
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Tag recorded next to every failed recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    KeyAgreement,
    Encryption,
    Signing,
    TokenAcquisition,
    Delivery,
    Cancelled,
    NoChannel,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::KeyAgreement(_) => ErrorKind::KeyAgreement,
            DispatchError::Encryption(_) => ErrorKind::Encryption,
            DispatchError::Signing(_) => ErrorKind::Signing,
            DispatchError::TokenAcquisition(_) => ErrorKind::TokenAcquisition,
            DispatchError::Delivery { .. } | DispatchError::Client(_) => ErrorKind::Delivery,
            DispatchError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn delivery(status: Option<u16>, message: impl Into<String>) -> Self {
        DispatchError::Delivery {
            status,
            message: message.into(),
            response: None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::KeyAgreement => "key_agreement",
            ErrorKind::Encryption => "encryption",
            ErrorKind::Signing => "signing",
            ErrorKind::TokenAcquisition => "token_acquisition",
            ErrorKind::Delivery => "delivery",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::NoChannel => "no_channel",
        };
        f.write_str(label)
    }
}
