use crate::fcm::{self, ServiceAccountStatus};
use crate::push::{self, VapidConfigStatus};
use crate::types::push::{ServiceAccountCredential, VapidConfig};

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_NOTIFICATION_TITLE: &str = "New Wildlife Sighting";
pub const DEFAULT_NOTIFICATION_BODY: &str = "A new sighting was reported near you.";
pub const DEFAULT_PUSH_CONCURRENCY: usize = 16;
pub const DEFAULT_PUSH_TTL: u32 = 86_400;
pub const WEB_PUSH_TIMEOUT: Duration = Duration::from_secs(30);
pub const FCM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub fcm_server_key: Option<String>,
    pub fcm_project_id: Option<String>,
    pub fcm_client_email: Option<String>,
    pub fcm_private_key: Option<String>,
    pub fcm_token_uri: String,
    pub fcm_base_url: String,
    pub notification_title: String,
    pub notification_body: String,
    pub push_concurrency: usize,
    pub push_ttl: u32,
    pub dispatch_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            fcm_server_key: None,
            fcm_project_id: None,
            fcm_client_email: None,
            fcm_private_key: None,
            fcm_token_uri: fcm::DEFAULT_TOKEN_URI.to_string(),
            fcm_base_url: fcm::DEFAULT_BASE_URL.to_string(),
            notification_title: DEFAULT_NOTIFICATION_TITLE.to_string(),
            notification_body: DEFAULT_NOTIFICATION_BODY.to_string(),
            push_concurrency: DEFAULT_PUSH_CONCURRENCY,
            push_ttl: DEFAULT_PUSH_TTL,
            dispatch_timeout: None,
        }
    }
}

/// Everything the dispatcher needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub vapid: Option<VapidConfig>,
    pub service_account: Option<ServiceAccountCredential>,
    pub legacy_server_key: Option<String>,
    pub fcm_base_url: String,
    pub concurrency: usize,
    pub ttl: u32,
    pub web_push_timeout: Duration,
    pub fcm_timeout: Duration,
    pub timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            vapid: None,
            service_account: None,
            legacy_server_key: None,
            fcm_base_url: fcm::DEFAULT_BASE_URL.to_string(),
            concurrency: DEFAULT_PUSH_CONCURRENCY,
            ttl: DEFAULT_PUSH_TTL,
            web_push_timeout: WEB_PUSH_TIMEOUT,
            fcm_timeout: FCM_TIMEOUT,
            timeout: None,
        }
    }
}

impl DispatchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let vapid = match push::load_vapid_config(config) {
            VapidConfigStatus::Ready(vapid) => Some(vapid),
            VapidConfigStatus::Incomplete => {
                tracing::warn!("web push disabled: incomplete VAPID configuration");
                None
            }
            VapidConfigStatus::Missing => None,
        };
        let service_account = match fcm::load_service_account(config) {
            ServiceAccountStatus::Ready(credential) => Some(credential),
            ServiceAccountStatus::Incomplete => {
                tracing::warn!("fcm v1 disabled: incomplete service account configuration");
                None
            }
            ServiceAccountStatus::Missing => None,
        };
        let legacy_server_key = config
            .fcm_server_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        Self {
            vapid,
            service_account,
            legacy_server_key,
            fcm_base_url: config.fcm_base_url.clone(),
            concurrency: config.push_concurrency.max(1),
            ttl: config.push_ttl,
            web_push_timeout: WEB_PUSH_TIMEOUT,
            fcm_timeout: FCM_TIMEOUT,
            timeout: config.dispatch_timeout,
        }
    }
}
