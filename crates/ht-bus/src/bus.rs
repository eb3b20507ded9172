// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`EventBus`] — synchronous publish/subscribe with hierarchy-aware
//! filtering and strict error isolation (spec §4.2).

use crate::event::Event;
use crate::subscription::{Subscription, SubscriptionToken};
use ht_core::LocationStore;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// A store shared between a host and the bus for ancestor/descendant
/// filtering. The bus never mutates it.
pub type SharedStore = Arc<Mutex<LocationStore>>;

/// Synchronous, single-process publish/subscribe fabric.
///
/// Cheap to clone and share: all state lives behind internal locks, so
/// `&self` suffices for every method, which is what makes re-entrant
/// `publish` calls from inside a handler possible.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<(SubscriptionToken, Subscription)>>,
    location_manager: Mutex<Option<SharedStore>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a store for ancestor/descendant filtering. Without one,
    /// `include_ancestors`/`include_descendants` subscriptions degrade to
    /// exact-location matching.
    pub fn set_location_manager(&self, store: SharedStore) {
        *self.location_manager.lock() = Some(store);
    }

    pub fn subscribe(&self, subscription: Subscription) -> SubscriptionToken {
        let token = SubscriptionToken::generate();
        self.subscriptions.lock().push((token.clone(), subscription));
        token
    }

    pub fn unsubscribe(&self, token: &SubscriptionToken) {
        self.subscriptions.lock().retain(|(t, _)| t != token);
    }

    /// Synchronously fan `event` out to every matching subscription, in
    /// registration order. Handlers are isolated from one another: a panic
    /// or returned error is logged and the remaining handlers still run.
    ///
    /// Re-entrant: the fan-out iterates a snapshot taken at the start of
    /// this call, so a handler calling `publish` again sees a consistent
    /// (if now slightly stale) subscription list, and subscribe/unsubscribe
    /// calls made during fan-out only affect subsequent publishes.
    pub fn publish(&self, event: Event) {
        debug!(event_type = %event.event_type, source = %event.source, "publishing event");
        let snapshot = self.subscriptions.lock().clone();

        for (token, subscription) in &snapshot {
            if !Self::matches_event_type(subscription, &event) {
                continue;
            }
            if !self.matches_location(&event, subscription) {
                continue;
            }

            let handler = Arc::clone(&subscription.handler);
            let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(subscription = %token, event_type = %event.event_type, error = %err, "event handler returned an error");
                }
                Err(_) => {
                    warn!(subscription = %token, event_type = %event.event_type, "event handler panicked");
                }
            }
        }
    }

    fn matches_event_type(subscription: &Subscription, event: &Event) -> bool {
        match &subscription.event_type {
            None => true,
            Some(wanted) => wanted == &event.event_type,
        }
    }

    fn matches_location(&self, event: &Event, subscription: &Subscription) -> bool {
        let Some(anchor) = &subscription.location_id else {
            return true;
        };
        let Some(event_location) = &event.location_id else {
            return false;
        };
        if event_location == anchor {
            return true;
        }
        let Some(store) = self.location_manager.lock().clone() else {
            return false;
        };
        let store = store.lock();
        (subscription.include_ancestors && store.is_ancestor(event_location, anchor))
            || (subscription.include_descendants && store.is_descendant(event_location, anchor))
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
