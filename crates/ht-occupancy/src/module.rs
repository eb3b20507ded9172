// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `OccupancyModule` — the stateful wrapper around the pure engine (spec §4.4).
//!
//! Holds a `Weak` reference to the store and the bus rather than an `Arc`:
//! the store holds a strong `Arc<dyn Module>` back to this module (via
//! `register_module`) and the bus's subscription closure also holds a
//! strong `Arc<Self>`, so a strong back-reference in either direction would
//! leak a reference cycle.

use crate::config::{migrate_config_blob, OccupancyConfig, OccupancyStrategy, CURRENT_CONFIG_VERSION};
use crate::engine;
use crate::ops::OccupancyOp;
use crate::persistence::{PersistedState, RestoreOutcome};
use crate::state::OccupancyState;
use chrono::{DateTime, Utc};
use ht_bus::{Event, EventBus, HandlerError, Subscription, SharedStore};
use ht_core::{Clock, LocationId, Module, ModuleId, SystemClock, ValidationError};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

fn module_id() -> ModuleId {
    ModuleId::new("occupancy")
}

/// Per-location occupancy state machine, hierarchical propagation, and
/// persistence. Generic over [`Clock`] purely for testability; production
/// callers use the default [`SystemClock`].
pub struct OccupancyModule<C: Clock = SystemClock> {
    states: Mutex<IndexMap<LocationId, OccupancyState>>,
    store: Mutex<Option<Weak<Mutex<ht_core::LocationStore>>>>,
    bus: Mutex<Option<Weak<EventBus>>>,
    clock: C,
}

impl OccupancyModule<SystemClock> {
    pub fn new() -> Arc<Self> {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock + 'static> OccupancyModule<C> {
    pub fn with_clock(clock: C) -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(IndexMap::new()),
            store: Mutex::new(None),
            bus: Mutex::new(None),
            clock,
        })
    }

    /// Capture `Weak` references to the bus and the store, and subscribe to
    /// `sensor.state_changed` (spec §4.4 "Event subscription").
    pub fn attach(self: &Arc<Self>, bus: Arc<EventBus>, store: SharedStore) {
        *self.store.lock() = Some(Arc::downgrade(&store));
        *self.bus.lock() = Some(Arc::downgrade(&bus));

        let weak_self = Arc::downgrade(self);
        bus.subscribe(
            Subscription::new(Arc::new(move |event: &Event| {
                let Some(module) = weak_self.upgrade() else {
                    return Ok(());
                };
                module.handle_sensor_event(event)
            }))
            .event_type("sensor.state_changed"),
        );
    }

    fn store(&self) -> Option<SharedStore> {
        self.store.lock().as_ref().and_then(Weak::upgrade)
    }

    fn bus(&self) -> Option<Arc<EventBus>> {
        self.bus.lock().as_ref().and_then(Weak::upgrade)
    }

    fn handle_sensor_event(&self, event: &Event) -> Result<(), HandlerError> {
        let Some(location_id) = &event.location_id else {
            return Ok(());
        };
        let op = OccupancyOp::from_payload(&event.payload).map_err(HandlerError::new)?;
        self.apply_and_propagate(location_id, op, Some(event.timestamp)).map_err(HandlerError::new)?;
        Ok(())
    }

    fn resolve_config(&self, location_id: &LocationId) -> OccupancyConfig {
        let Some(store) = self.store() else {
            return OccupancyConfig::default();
        };
        let store = store.lock();
        match store.get_module_config(location_id, &module_id()) {
            Some(blob) => OccupancyConfig::from_blob(&migrate_config_blob(blob.clone())),
            None => OccupancyConfig::default(),
        }
    }

    fn state_of(&self, location_id: &LocationId) -> OccupancyState {
        self.states.lock().get(location_id).cloned().unwrap_or_default()
    }

    /// Read-only view of a location's current runtime state.
    pub fn current_state(&self, location_id: &LocationId) -> OccupancyState {
        self.state_of(location_id)
    }

    // -----------------------------------------------------------------
    // Direct API (spec §4.4 "Direct API")
    // -----------------------------------------------------------------

    pub fn trigger(
        &self,
        location_id: &LocationId,
        source_id: impl Into<String>,
        timeout_secs: Option<i64>,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), ValidationError> {
        self.apply_and_propagate(
            location_id,
            OccupancyOp::Trigger { source_id: source_id.into(), timeout_secs },
            at,
        )
    }

    pub fn hold(&self, location_id: &LocationId, source_id: impl Into<String>, at: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
        self.apply_and_propagate(location_id, OccupancyOp::Hold { source_id: source_id.into() }, at)
    }

    pub fn release(
        &self,
        location_id: &LocationId,
        source_id: impl Into<String>,
        trailing_timeout_secs: Option<i64>,
        at: Option<DateTime<Utc>>,
    ) -> Result<(), ValidationError> {
        self.apply_and_propagate(
            location_id,
            OccupancyOp::Release { source_id: source_id.into(), trailing_timeout_secs },
            at,
        )
    }

    pub fn vacate(&self, location_id: &LocationId, at: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
        self.apply_and_propagate(location_id, OccupancyOp::Vacate, at)
    }

    pub fn lock(&self, location_id: &LocationId, source_id: impl Into<String>, at: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
        self.apply_and_propagate(location_id, OccupancyOp::Lock { source_id: source_id.into() }, at)
    }

    pub fn unlock(&self, location_id: &LocationId, source_id: impl Into<String>, at: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
        self.apply_and_propagate(location_id, OccupancyOp::Unlock { source_id: source_id.into() }, at)
    }

    pub fn unlock_all(&self, location_id: &LocationId, at: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
        self.apply_and_propagate(location_id, OccupancyOp::UnlockAll, at)
    }

    /// Vacate `location_id` and every descendant, children first (spec §4.4).
    /// Locked locations are skipped unless `include_locked`, in which case
    /// they are unlocked (all sources) then vacated. Returns the ids that
    /// actually transitioned.
    pub fn vacate_area(
        &self,
        location_id: &LocationId,
        include_locked: bool,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<LocationId>, ValidationError> {
        let now = at.unwrap_or_else(|| self.clock.now());
        let store = self.store().ok_or_else(|| ValidationError::UnknownLocation(location_id.clone()))?;
        let mut order: Vec<LocationId> = {
            let store = store.lock();
            if store.get(location_id).is_none() {
                return Err(ValidationError::UnknownLocation(location_id.clone()));
            }
            store.descendants_of(location_id).into_iter().map(|l| l.id.clone()).collect()
        };
        order.reverse();
        order.push(location_id.clone());

        let mut transitioned = Vec::new();
        for id in order {
            let was_locked = self.state_of(&id).is_locked();
            if was_locked {
                if !include_locked {
                    continue;
                }
                self.apply_and_propagate(&id, OccupancyOp::UnlockAll, Some(now))?;
            }
            self.apply_and_propagate(&id, OccupancyOp::Vacate, Some(now))?;
            transitioned.push(id);
        }
        Ok(transitioned)
    }

    fn apply_and_propagate(&self, location_id: &LocationId, op: OccupancyOp, at: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
        let now = at.unwrap_or_else(|| self.clock.now());
        let store = self.store().ok_or_else(|| ValidationError::UnknownLocation(location_id.clone()))?;
        if store.lock().get(location_id).is_none() {
            return Err(ValidationError::UnknownLocation(location_id.clone()));
        }

        let config = self.resolve_config(location_id);
        if config.occupancy_strategy == OccupancyStrategy::FollowParent {
            // Its own state is derived from its parent, not accumulated
            // from operations addressed to it directly (spec §4.3).
            return Ok(());
        }

        let old = self.state_of(location_id);
        let new = engine::apply_op(&old, &config, &op, now)?;
        let changed = self.set_state_and_emit(location_id, &old, new, op.reason(), now);
        if changed && config.contributes_to_parent {
            self.propagate(location_id, now);
        }
        Ok(())
    }

    /// Walk ancestors nearest-first, folding each child's current state into
    /// its parent as an incremental hold/trigger/release so the parent's own
    /// `occupied_until` keeps reflecting the max across all its contributing
    /// descendants (spec §4.4 rules 1-4).
    fn propagate(&self, start: &LocationId, now: DateTime<Utc>) {
        let Some(store) = self.store() else {
            return;
        };
        let ancestors: Vec<LocationId> = {
            let store = store.lock();
            store.ancestors_of(start).into_iter().map(|l| l.id.clone()).collect()
        };

        let mut child_id = start.clone();
        for ancestor_id in ancestors {
            let ancestor_config = self.resolve_config(&ancestor_id);
            if ancestor_config.occupancy_strategy == OccupancyStrategy::FollowParent {
                break;
            }

            let child_state = self.state_of(&child_id);
            let old_ancestor = self.state_of(&ancestor_id);
            let mut ancestor_state = old_ancestor.clone();

            // A synthetic hold only ever ends because the child itself
            // stopped holding; releasing it gets the ancestor's own grace
            // period (spec §4.4 rule 3). A child that was merely occupied
            // on a timer needs no such release: the ancestor's timer was
            // already the max of its own and the child's, and expires on
            // its own once ticked.
            if old_ancestor.active_holds.contains(child_id.as_str()) && !child_state.is_held() {
                let trailing = ancestor_config.hold_release_timeout.as_secs() as i64;
                ancestor_state = engine::apply_op(
                    &ancestor_state,
                    &ancestor_config,
                    &OccupancyOp::Release { source_id: child_id.as_str().to_string(), trailing_timeout_secs: Some(trailing.max(1)) },
                    now,
                )
                .unwrap_or(ancestor_state);
            }

            if child_state.is_held() {
                ancestor_state = engine::apply_op(
                    &ancestor_state,
                    &ancestor_config,
                    &OccupancyOp::Hold { source_id: child_id.as_str().to_string() },
                    now,
                )
                .unwrap_or(ancestor_state);
                // Rule 2's held-style transition is stronger than a plain
                // HOLD: the ancestor's own timer (if any) is discarded, not
                // preserved, since the child is occupied indefinitely.
                ancestor_state.occupied_until = None;
                ancestor_state.timer_remaining = None;
            } else if child_state.is_occupied {
                if let Some(until) = child_state.occupied_until {
                    let secs = (until - now).num_seconds().max(1);
                    ancestor_state = engine::apply_op(
                        &ancestor_state,
                        &ancestor_config,
                        &OccupancyOp::Trigger { source_id: child_id.as_str().to_string(), timeout_secs: Some(secs) },
                        now,
                    )
                    .unwrap_or(ancestor_state);
                }
            }

            let reason = format!("propagated:{child_id}");
            let changed = self.set_state_and_emit(&ancestor_id, &old_ancestor, ancestor_state, reason, now);
            if !changed || !ancestor_config.contributes_to_parent {
                break;
            }
            child_id = ancestor_id;
        }
    }

    fn set_state_and_emit(&self, location_id: &LocationId, old: &OccupancyState, new: OccupancyState, reason: String, now: DateTime<Utc>) -> bool {
        let changed = old.is_occupied != new.is_occupied
            || old.occupied_until != new.occupied_until
            || old.active_holds != new.active_holds
            || old.locked_by != new.locked_by;

        self.states.lock().insert(location_id.clone(), new.clone());
        if changed {
            self.emit_changed(location_id, old, &new, reason, now);
            self.mirror_to_children(location_id, now);
        }
        changed
    }

    /// Push a changed location's `is_occupied`/`occupied_until` down onto any
    /// direct child configured `occupancy_strategy = follow_parent` (spec
    /// §4.3 "Follow-parent strategy"). Such a child never accumulates its own
    /// state from operations — those are dropped in `apply_and_propagate` —
    /// so its state exists only as this mirror. Recurses for a chain of
    /// follow-parent descendants; never re-enters upward propagation.
    fn mirror_to_children(&self, location_id: &LocationId, now: DateTime<Utc>) {
        let Some(store) = self.store() else {
            return;
        };
        let children: Vec<LocationId> = {
            let store = store.lock();
            store.children_of(location_id).into_iter().map(|l| l.id.clone()).collect()
        };
        if children.is_empty() {
            return;
        }

        let parent_state = self.state_of(location_id);
        for child_id in children {
            if self.resolve_config(&child_id).occupancy_strategy != OccupancyStrategy::FollowParent {
                continue;
            }
            let old_child = self.state_of(&child_id);
            let new_child =
                OccupancyState { is_occupied: parent_state.is_occupied, occupied_until: parent_state.occupied_until, ..OccupancyState::default() };
            let reason = format!("follows:{location_id}");
            self.set_state_and_emit(&child_id, &old_child, new_child, reason, now);
        }
    }

    fn emit_changed(&self, location_id: &LocationId, old: &OccupancyState, new: &OccupancyState, reason: String, now: DateTime<Utc>) {
        let Some(bus) = self.bus() else {
            return;
        };
        let payload = serde_json::json!({
            "occupied": new.is_occupied,
            "previous_occupied": old.is_occupied,
            "reason": reason,
            "occupied_until": new.occupied_until,
            "active_holds": new.active_holds.iter().cloned().collect::<Vec<_>>(),
            "locked_by": new.locked_by.iter().cloned().collect::<Vec<_>>(),
        });
        let event = Event::new("occupancy.changed", "occupancy", now).location_id(location_id.clone()).payload(payload);
        bus.publish(event);
    }

    // -----------------------------------------------------------------
    // Effective timeout & host-driven ticking (spec §4.4)
    // -----------------------------------------------------------------

    /// The latest instant the subtree rooted at `location_id` will have been
    /// vacant, or `None` if it or any descendant is held or already vacant
    /// with no pending expiry.
    pub fn get_effective_timeout(&self, location_id: &LocationId, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let state = self.state_of(location_id);
        if state.is_held() {
            return None;
        }
        let mut latest = state.occupied_until.filter(|until| *until > now);

        if let Some(store) = self.store() {
            let descendants: Vec<LocationId> = {
                let store = store.lock();
                store.descendants_of(location_id).into_iter().map(|l| l.id.clone()).collect()
            };
            for descendant in descendants {
                let descendant_state = self.state_of(&descendant);
                if descendant_state.is_held() {
                    return None;
                }
                if let Some(until) = descendant_state.occupied_until.filter(|until| *until > now) {
                    latest = Some(latest.map_or(until, |current| current.max(until)));
                }
            }
        }
        latest
    }

    /// The minimum `occupied_until` across every tracked location that is
    /// neither locked nor held, for the host to schedule its next
    /// `check_timeouts` call. `None` if no such location exists.
    pub fn get_next_timeout(&self) -> Option<DateTime<Utc>> {
        self.states
            .lock()
            .values()
            .filter(|state| !state.is_locked() && !state.is_held())
            .filter_map(|state| state.occupied_until)
            .min()
    }

    /// Apply `tick` to every tracked location, emitting `occupancy.changed`
    /// and propagating upward for each transition. Intended to be called by
    /// the host on the cadence `get_next_timeout` suggests.
    pub fn check_timeouts(&self, now: DateTime<Utc>) {
        let ids: Vec<LocationId> = self.states.lock().keys().cloned().collect();
        for id in ids {
            let config = self.resolve_config(&id);
            if config.occupancy_strategy == OccupancyStrategy::FollowParent {
                // Derived entirely from the parent via `mirror_to_children`;
                // ticking it directly would race the parent's own tick.
                continue;
            }
            let old = self.state_of(&id);
            let new = engine::tick(&old, now);
            let changed = self.set_state_and_emit(&id, &old, new, "tick".to_string(), now);
            if changed && config.contributes_to_parent {
                self.propagate(&id, now);
            }
        }
    }

    // -----------------------------------------------------------------
    // Persistence (spec §4.4 "State persistence")
    // -----------------------------------------------------------------

    pub fn dump_state(&self, saved_at: DateTime<Utc>) -> PersistedState {
        PersistedState::from_states(&self.states.lock(), saved_at)
    }

    pub fn restore_state(&self, blob: &serde_json::Value, now: DateTime<Utc>, max_age_minutes: i64) -> RestoreOutcome {
        let (restored, outcome) = crate::persistence::restore(blob, now, max_age_minutes);
        *self.states.lock() = restored;
        outcome
    }
}

impl<C: Clock + 'static> Module for OccupancyModule<C> {
    fn id(&self) -> &str {
        "occupancy"
    }

    fn current_config_version(&self) -> u32 {
        CURRENT_CONFIG_VERSION
    }

    fn default_config(&self) -> serde_json::Value {
        crate::config::default_config_blob()
    }

    fn location_config_schema(&self) -> serde_json::Value {
        crate::config::config_schema()
    }

    fn migrate_config(&self, blob: serde_json::Value) -> serde_json::Value {
        migrate_config_blob(blob)
    }

    fn on_location_deleted(&self, location_id: &LocationId) {
        debug!(location = %location_id, "occupancy module dropping runtime state for deleted location");
        self.states.lock().shift_remove(location_id);
    }
}

#[cfg(test)]
#[path = "module_tests.rs"]
mod tests;
