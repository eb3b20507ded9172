// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The immutable [`Event`] record (spec §3.2).

use chrono::{DateTime, Utc};
use ht_core::{EntityId, LocationId};
use serde::{Deserialize, Serialize};

/// An immutable record produced into the bus.
///
/// `event_type` serializes as `"type"` to match the wire shape other
/// integrations (loggers, replay tools) expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub location_id: Option<LocationId>,
    pub entity_id: Option<EntityId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            location_id: None,
            entity_id: None,
            payload: serde_json::Value::Null,
            timestamp,
        }
    }

    ht_core::setters! {
        option {
            location_id: LocationId,
            entity_id: EntityId,
        }
        set {
            payload: serde_json::Value,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
