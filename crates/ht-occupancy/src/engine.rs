// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pure occupancy state machine (spec §4.3).
//!
//! Every function here is `(previous_state, ..., now) -> new_state`; none of
//! them touch the store, the bus, or a clock. Location existence and
//! upward propagation are [`crate::module::OccupancyModule`]'s job.

use crate::config::OccupancyConfig;
use crate::ops::OccupancyOp;
use crate::state::OccupancyState;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ht_core::ValidationError;
use std::time::Duration;

fn to_chrono(d: Duration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or_default()
}

fn validate_timeout(secs: Option<i64>) -> Result<(), ValidationError> {
    match secs {
        Some(n) if n < 0 => Err(ValidationError::NegativeTimeout),
        _ => Ok(()),
    }
}

/// `timeout_secs = None` or `Some(0)` both mean "use the configured
/// default"; anything else is an explicit, already-validated duration.
fn resolve_timeout(secs: Option<i64>, default: Duration) -> ChronoDuration {
    match secs {
        None | Some(0) => to_chrono(default),
        Some(n) => ChronoDuration::seconds(n),
    }
}

/// Apply one operation to `state`, returning the resulting state.
///
/// Never mutates `state` in place; every transition produces a new value
/// (spec §9 "Immutable runtime state"). Fails only on a negative timeout;
/// unknown-location checks belong to the caller, since the engine has no
/// notion of a store.
pub fn apply_op(
    state: &OccupancyState,
    config: &OccupancyConfig,
    op: &OccupancyOp,
    now: DateTime<Utc>,
) -> Result<OccupancyState, ValidationError> {
    match op {
        OccupancyOp::Trigger { timeout_secs, .. } => {
            validate_timeout(*timeout_secs)?;
            let mut next = state.clone();
            if next.is_locked() {
                return Ok(next);
            }
            let candidate = now + resolve_timeout(*timeout_secs, config.default_timeout);
            next.occupied_until = Some(match next.occupied_until {
                Some(old) if old > now => old.max(candidate),
                _ => candidate,
            });
            next.is_occupied = true;
            Ok(next)
        }

        OccupancyOp::Hold { source_id } => {
            let mut next = state.clone();
            if next.is_locked() {
                return Ok(next);
            }
            next.active_holds.insert(source_id.clone());
            next.is_occupied = true;
            Ok(next)
        }

        OccupancyOp::Release { source_id, trailing_timeout_secs } => {
            validate_timeout(*trailing_timeout_secs)?;
            let mut next = state.clone();
            if next.is_locked() {
                return Ok(next);
            }
            let was_present = next.active_holds.shift_remove(source_id);
            if was_present && next.active_holds.is_empty() {
                let candidate = now + resolve_timeout(*trailing_timeout_secs, config.hold_release_timeout);
                next.occupied_until = match next.occupied_until {
                    Some(existing) if existing > candidate => Some(existing),
                    _ => Some(candidate),
                };
            }
            Ok(next)
        }

        OccupancyOp::Vacate => {
            let mut next = state.clone();
            if next.is_locked() {
                return Ok(next);
            }
            next.active_holds.clear();
            next.occupied_until = None;
            next.timer_remaining = None;
            next.is_occupied = false;
            Ok(next)
        }

        OccupancyOp::Lock { source_id } => {
            let mut next = state.clone();
            let is_first_lock = next.locked_by.is_empty();
            next.locked_by.insert(source_id.clone());
            if is_first_lock {
                if let Some(until) = next.occupied_until {
                    if until > now {
                        next.timer_remaining = Some((until - now).to_std().unwrap_or(Duration::ZERO));
                        next.occupied_until = None;
                    }
                }
            }
            Ok(next)
        }

        OccupancyOp::Unlock { source_id } => {
            let mut next = state.clone();
            next.locked_by.shift_remove(source_id);
            resume_timer_if_unlocked(&mut next, now);
            Ok(next)
        }

        OccupancyOp::UnlockAll => {
            let mut next = state.clone();
            next.locked_by.clear();
            resume_timer_if_unlocked(&mut next, now);
            Ok(next)
        }
    }
}

fn resume_timer_if_unlocked(state: &mut OccupancyState, now: DateTime<Utc>) {
    if state.locked_by.is_empty() {
        if let Some(remaining) = state.timer_remaining.take() {
            state.occupied_until = Some(now + to_chrono(remaining));
        }
    }
}

/// Apply timer expiry. Infallible: ticking never touches a locked or held
/// location, and a location with no running timer is unaffected.
pub fn tick(state: &OccupancyState, now: DateTime<Utc>) -> OccupancyState {
    if state.is_locked() || state.is_held() {
        return state.clone();
    }
    let mut next = state.clone();
    if let Some(until) = next.occupied_until {
        if until <= now {
            next.occupied_until = None;
            next.is_occupied = false;
        }
    }
    next
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
