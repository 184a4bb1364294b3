use crate::dispatch::pool;
use crate::ports;
use crate::types::dispatch::{Channel, DispatchResult, RecipientOutcome};
use crate::types::push::{NotificationMessage, PushSubscription};

mod client;
pub mod registry;
pub(crate) mod vapid;

use tokio_util::sync::CancellationToken;

pub use client::WebPushClient;
pub use registry::SubscriptionRegistry;
pub use vapid::{
    VapidConfigStatus, VapidCredentials, VapidSigner, generate_vapid_credentials,
    load_vapid_config,
};

/// Delivers to every subscription, at most `concurrency` requests in flight.
pub(crate) async fn dispatch_web_push<T: ports::TimeProvider>(
    client: &WebPushClient<T>,
    subscriptions: &[PushSubscription],
    message: &NotificationMessage,
    concurrency: usize,
    cancel: &CancellationToken,
) -> DispatchResult {
    let outcomes = pool::fan_out(
        subscriptions,
        concurrency,
        cancel,
        |subscription| client.deliver(subscription, message),
        |subscription| RecipientOutcome::cancelled(&subscription.endpoint),
    )
    .await;
    DispatchResult::from_outcomes(Channel::WebPush, outcomes)
}
