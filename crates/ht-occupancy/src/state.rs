// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-location runtime occupancy state (spec §4.3).
//!
//! Deliberately not `Serialize`/`Deserialize`: the wire format for
//! persistence is [`crate::persistence::PersistedState`], which is derived
//! from this type rather than being this type, so in-memory and on-disk
//! representations can evolve independently.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use std::time::Duration;

/// Runtime occupancy state for a single location.
///
/// `active_holds` and `locked_by` are ordered sets keyed by source id: a
/// source may only appear once, and iteration/serialization order is
/// insertion order, so event payloads and persisted blobs are deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OccupancyState {
    pub is_occupied: bool,
    pub occupied_until: Option<DateTime<Utc>>,
    pub timer_remaining: Option<Duration>,
    pub active_holds: IndexSet<String>,
    pub locked_by: IndexSet<String>,
}

impl OccupancyState {
    /// A location with no activity: unoccupied, no timer, no holds, no locks.
    pub fn vacant() -> Self {
        Self::default()
    }

    /// Whether any source currently holds a lock on this location.
    pub fn is_locked(&self) -> bool {
        !self.locked_by.is_empty()
    }

    /// Whether any source currently holds this location occupied
    /// indefinitely (independent of the timeout-driven `occupied_until`).
    pub fn is_held(&self) -> bool {
        !self.active_holds.is_empty()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
