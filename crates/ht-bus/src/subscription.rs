// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Subscription`] and the handler contract (spec §3.3).

use crate::event::Event;
use ht_core::LocationId;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error a handler may return. The bus only ever logs this; it never
/// propagates back to the publisher (spec §7).
#[derive(Debug, Error)]
#[error("handler failed: {0}")]
pub struct HandlerError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl HandlerError {
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}

pub type Handler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// A bus-issued token returned by `subscribe`, used to `unsubscribe` later.
///
/// Unlike [`ht_core::LocationId`] and friends, this is generated by the bus
/// itself, never caller-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(String);

impl SubscriptionToken {
    pub(crate) fn generate() -> Self {
        Self(nanoid::nanoid!())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A standing registration matched against every published [`Event`].
///
/// Not `Serialize`/`Deserialize`: it carries a live handler closure, so it
/// is a runtime-only object, unlike `Event` which is pure data.
#[derive(Clone)]
pub struct Subscription {
    pub event_type: Option<String>,
    pub location_id: Option<LocationId>,
    pub include_ancestors: bool,
    pub include_descendants: bool,
    pub handler: Handler,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("location_id", &self.location_id)
            .field("include_ancestors", &self.include_ancestors)
            .field("include_descendants", &self.include_descendants)
            .field("handler", &"<fn>")
            .finish()
    }
}

impl Subscription {
    pub fn new(handler: Handler) -> Self {
        Self {
            event_type: None,
            location_id: None,
            include_ancestors: false,
            include_descendants: false,
            handler,
        }
    }

    ht_core::setters! {
        option {
            event_type: String,
            location_id: LocationId,
        }
        set {
            include_ancestors: bool,
            include_descendants: bool,
        }
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
