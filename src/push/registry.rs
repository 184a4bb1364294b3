use crate::types::push::PushSubscription;

use std::collections::HashMap;
use time::OffsetDateTime;

/// In-memory subscription store keyed by endpoint.
#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    entries: Vec<PushSubscription>,
    ids: HashMap<String, usize>,
}

impl SubscriptionRegistry {
    /// Inserts or replaces the subscription for its endpoint and returns a
    /// stable 1-based id. Re-subscribing refreshes keys and `last_used_at`.
    pub fn upsert(&mut self, mut subscription: PushSubscription, now: OffsetDateTime) -> usize {
        subscription.endpoint = subscription.endpoint.trim().to_string();
        subscription.last_used_at = Some(now);
        if let Some(&index) = self.ids.get(&subscription.endpoint) {
            self.entries[index] = subscription;
            return index + 1;
        }
        let index = self.entries.len();
        self.ids.insert(subscription.endpoint.clone(), index);
        self.entries.push(subscription);
        index + 1
    }

    pub fn get(&self, endpoint: &str) -> Option<&PushSubscription> {
        self.ids.get(endpoint).map(|&index| &self.entries[index])
    }

    pub fn subscriptions(&self) -> Vec<PushSubscription> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
