// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-aware persistence of runtime occupancy state (spec §4.4 "State
//! persistence").
//!
//! Deliberately a separate wire type from [`crate::state::OccupancyState`]:
//! the in-memory type is never `Serialize`-derived, keeping the pure
//! runtime representation and the on-disk blob format free to evolve apart.

use crate::state::OccupancyState;
use chrono::{DateTime, Utc};
use ht_core::LocationId;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The blob format version this build emits. Restoring any other version
/// yields empty state (spec §4.4, §8 "Restoring a blob with a `version`
/// unknown to the module yields empty state").
pub const PERSISTED_STATE_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub locations: IndexMap<LocationId, PersistedLocationState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedLocationState {
    pub is_occupied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupied_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "option_duration_secs")]
    pub timer_remaining: Option<Duration>,
    pub active_holds: IndexSet<String>,
    pub locked_by: IndexSet<String>,
}

impl From<&OccupancyState> for PersistedLocationState {
    fn from(state: &OccupancyState) -> Self {
        Self {
            is_occupied: state.is_occupied,
            occupied_until: state.occupied_until,
            timer_remaining: state.timer_remaining,
            active_holds: state.active_holds.clone(),
            locked_by: state.locked_by.clone(),
        }
    }
}

impl From<PersistedLocationState> for OccupancyState {
    fn from(persisted: PersistedLocationState) -> Self {
        Self {
            is_occupied: persisted.is_occupied,
            occupied_until: persisted.occupied_until,
            timer_remaining: persisted.timer_remaining,
            active_holds: persisted.active_holds,
            locked_by: persisted.locked_by,
        }
    }
}

impl PersistedState {
    pub fn from_states(states: &IndexMap<LocationId, OccupancyState>, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: PERSISTED_STATE_VERSION,
            saved_at,
            locations: states.iter().map(|(id, state)| (id.clone(), state.into())).collect(),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// What happened while restoring a blob, for host-side logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// The blob's `version` didn't match [`PERSISTED_STATE_VERSION`] (or the
    /// blob didn't parse); the module now holds empty state.
    pub version_mismatch: bool,
    pub restored: usize,
    pub dropped_stale: usize,
}

/// Restore runtime state from a dumped blob (spec §4.4).
///
/// Locked locations are restored unconditionally, since locks survive a
/// restart. Everything else older than `max_age_minutes` is dropped.
/// Surviving records whose timer has already elapsed relative to `now` are
/// normalized back to vacant. No events are emitted here; the next op or
/// tick is what produces visible transitions.
pub(crate) fn restore(
    blob: &serde_json::Value,
    now: DateTime<Utc>,
    max_age_minutes: i64,
) -> (IndexMap<LocationId, OccupancyState>, RestoreOutcome) {
    let Ok(persisted) = serde_json::from_value::<PersistedState>(blob.clone()) else {
        return (IndexMap::new(), RestoreOutcome { version_mismatch: true, ..Default::default() });
    };
    if persisted.version != PERSISTED_STATE_VERSION {
        return (IndexMap::new(), RestoreOutcome { version_mismatch: true, ..Default::default() });
    }

    let age_minutes = (now - persisted.saved_at).num_minutes();
    let mut restored = IndexMap::new();
    let mut outcome = RestoreOutcome::default();

    for (id, record) in persisted.locations {
        let locked = !record.locked_by.is_empty();
        if !locked && age_minutes > max_age_minutes {
            outcome.dropped_stale += 1;
            continue;
        }

        let mut state: OccupancyState = record.into();
        if let Some(until) = state.occupied_until {
            if until <= now {
                state.occupied_until = None;
                state.is_occupied = false;
            }
        }
        restored.insert(id, state);
        outcome.restored += 1;
    }

    (restored, outcome)
}

mod option_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        duration.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
