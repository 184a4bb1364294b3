use crate::adapters::{self, TokioTimeProvider};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::fcm::{self, FcmLegacyClient, FcmV1Client};
use crate::ports;
use crate::push::{self, VapidSigner, WebPushClient};
use crate::types::dispatch::{Channel, DispatchResult, RecipientOutcome};
use crate::types::push::{DeviceToken, NotificationMessage, PushSubscription};

pub(crate) mod pool;

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fans one notification out to every configured channel.
///
/// Web Push serves browser subscriptions. Device tokens go to FCM v1 when a
/// service account is configured and to the legacy API otherwise. Each
/// returned [`DispatchResult`] satisfies `success + failure == requested`.
pub struct Dispatcher<T = TokioTimeProvider> {
    time: T,
    concurrency: usize,
    timeout: Option<Duration>,
    web_push: Option<WebPushClient<T>>,
    fcm_v1: Option<FcmV1Client<T>>,
    fcm_legacy: Option<FcmLegacyClient>,
}

impl Dispatcher<TokioTimeProvider> {
    pub fn from_config(config: DispatchConfig) -> Result<Self, DispatchError> {
        Self::new(config, TokioTimeProvider)
    }
}

impl<T> Dispatcher<T>
where
    T: ports::TimeProvider,
{
    pub fn new(config: DispatchConfig, time: T) -> Result<Self, DispatchError> {
        let http = adapters::http_client()?;

        let web_push = match config.vapid.as_ref() {
            Some(vapid) => Some(WebPushClient::new(
                http.clone(),
                VapidSigner::new(vapid)?,
                time.clone(),
                config.ttl,
                config.web_push_timeout,
            )),
            None => None,
        };
        let fcm_v1 = match config.service_account.as_ref() {
            Some(credential) => Some(FcmV1Client::new(
                http.clone(),
                credential,
                &config.fcm_base_url,
                time.clone(),
                config.fcm_timeout,
            )),
            None => None,
        };
        let fcm_legacy = match (&fcm_v1, config.legacy_server_key) {
            (None, Some(server_key)) => Some(FcmLegacyClient::new(
                http,
                server_key,
                &config.fcm_base_url,
                config.fcm_timeout,
            )),
            _ => None,
        };

        let dispatcher = Self {
            time,
            concurrency: config.concurrency.max(1),
            timeout: config.timeout,
            web_push,
            fcm_v1,
            fcm_legacy,
        };
        tracing::info!(
            channels = ?dispatcher.channels(),
            concurrency = dispatcher.concurrency,
            "push dispatcher ready"
        );
        Ok(dispatcher)
    }

    pub fn channels(&self) -> Vec<Channel> {
        let mut channels = Vec::new();
        if self.web_push.is_some() {
            channels.push(Channel::WebPush);
        }
        if self.fcm_v1.is_some() {
            channels.push(Channel::FcmV1);
        }
        if self.fcm_legacy.is_some() {
            channels.push(Channel::FcmLegacy);
        }
        channels
    }

    pub fn web_push_public_key(&self) -> Option<&str> {
        self.web_push.as_ref().map(WebPushClient::public_key)
    }

    pub async fn dispatch(
        &self,
        message: &NotificationMessage,
        subscriptions: &[PushSubscription],
        tokens: &[DeviceToken],
    ) -> Vec<DispatchResult> {
        self.dispatch_with_cancel(message, subscriptions, tokens, CancellationToken::new())
            .await
    }

    /// Like [`Dispatcher::dispatch`], but stops early once `cancel` fires or
    /// the configured deadline passes. Deliveries that never completed are
    /// reported as cancelled failures.
    pub async fn dispatch_with_cancel(
        &self,
        message: &NotificationMessage,
        subscriptions: &[PushSubscription],
        tokens: &[DeviceToken],
        cancel: CancellationToken,
    ) -> Vec<DispatchResult> {
        let cancel = cancel.child_token();
        let work = self.run_channels(message, subscriptions, tokens, &cancel);
        let results = self.with_deadline(work, &cancel).await;
        for result in &results {
            log_result(result);
        }
        results
    }

    async fn with_deadline<F: Future>(&self, work: F, cancel: &CancellationToken) -> F::Output {
        let Some(timeout) = self.timeout else {
            return work.await;
        };
        tokio::pin!(work);
        tokio::select! {
            output = &mut work => output,
            () = self.time.sleep(timeout) => {
                tracing::warn!(?timeout, "dispatch deadline reached, cancelling outstanding deliveries");
                cancel.cancel();
                work.await
            }
        }
    }

    async fn run_channels(
        &self,
        message: &NotificationMessage,
        subscriptions: &[PushSubscription],
        tokens: &[DeviceToken],
        cancel: &CancellationToken,
    ) -> Vec<DispatchResult> {
        let web = async {
            match &self.web_push {
                Some(client) if !subscriptions.is_empty() => Some(
                    push::dispatch_web_push(client, subscriptions, message, self.concurrency, cancel)
                        .await,
                ),
                _ => None,
            }
        };
        let devices = async {
            if tokens.is_empty() {
                return None;
            }
            if let Some(client) = &self.fcm_v1 {
                return Some(fcm::dispatch_v1(client, tokens, message, self.concurrency, cancel).await);
            }
            if let Some(client) = &self.fcm_legacy {
                return Some(
                    fcm::dispatch_legacy(client, tokens, message, self.concurrency, cancel).await,
                );
            }
            None
        };
        let (web, devices) = tokio::join!(web, devices);

        let mut results: Vec<DispatchResult> = [web, devices].into_iter().flatten().collect();
        let unroutable = self.unroutable(subscriptions, tokens);
        if !unroutable.is_empty() {
            results.push(DispatchResult::from_outcomes(Channel::None, unroutable));
        }
        results
    }

    fn unroutable(
        &self,
        subscriptions: &[PushSubscription],
        tokens: &[DeviceToken],
    ) -> Vec<RecipientOutcome> {
        let mut outcomes = Vec::new();
        if self.web_push.is_none() {
            outcomes.extend(subscriptions.iter().map(|subscription| {
                RecipientOutcome::unroutable(&subscription.endpoint, "web push is not configured")
            }));
        }
        if self.fcm_v1.is_none() && self.fcm_legacy.is_none() {
            outcomes.extend(
                tokens
                    .iter()
                    .map(|token| RecipientOutcome::unroutable(token, "no FCM credentials configured")),
            );
        }
        outcomes
    }
}

fn log_result(result: &DispatchResult) {
    tracing::info!(
        channel = result.channel.label(),
        requested = result.requested,
        success = result.success_count,
        failure = result.failure_count,
        "push dispatch finished"
    );
    for outcome in result.failures() {
        let Some(error) = outcome.error.as_ref() else {
            continue;
        };
        tracing::warn!(
            channel = result.channel.label(),
            recipient = %outcome.recipient,
            kind = %error.kind,
            status = ?outcome.status,
            gone = outcome.gone,
            "push delivery failed: {}",
            error.message
        );
    }
}
