use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::push::SubscriptionRegistry;

use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub subscriptions: Arc<Mutex<SubscriptionRegistry>>,
}
