use crate::config;
use crate::dispatch::Dispatcher;
use crate::error::DispatchError;
use crate::push::SubscriptionRegistry;
use crate::state;

use axum::Router;
use axum::routing::get;
use axum::routing::post;

use std::sync::{Arc, Mutex};

mod push;
mod sightings;

pub fn app(config: config::AppConfig) -> Result<Router, DispatchError> {
    let dispatcher = Dispatcher::from_config(config::DispatchConfig::from_app_config(&config))?;
    let state = state::AppState {
        config,
        dispatcher: Arc::new(dispatcher),
        subscriptions: Arc::new(Mutex::new(SubscriptionRegistry::default())),
    };
    Ok(router(state))
}

pub(crate) fn router(state: state::AppState) -> Router {
    Router::new()
        .route("/api/push/public-key", get(push::push_public_key))
        .route("/api/push/subscribe", post(push::push_subscribe))
        .route("/api/push/test", post(push::push_test))
        .route("/api/sightings/notify", post(sightings::sightings_notify))
        .route("/health", get(health))
        .with_state(state)
}

pub(crate) async fn health() -> &'static str {
    "ok"
}
