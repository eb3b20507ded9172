// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract behavior-module interface (spec §4.5).
//!
//! Only the two store-facing hooks are part of the trait object the store
//! holds: `attach`, `dump_state`, and `restore_state` are concrete,
//! bus/clock-typed APIs that belong to each module's own inherent impl (see
//! `ht-occupancy::OccupancyModule`), not to this trait.

use crate::ids::LocationId;

/// A pluggable behavior module registered with a [`crate::LocationStore`].
///
/// Implementors are notified when a location they might have runtime state
/// for is about to be deleted, and when per-location config changes. Both
/// hooks follow the bus's "log and swallow" error policy: exceptions never
/// propagate back to the store's caller (see spec §7).
pub trait Module: Send + Sync {
    /// Stable identifier, e.g. `"occupancy"`. Used as the key into
    /// [`crate::Location::modules`].
    fn id(&self) -> &str;

    /// The config schema version this build of the module currently emits.
    fn current_config_version(&self) -> u32;

    /// Default config blob for a location that hasn't configured this module.
    fn default_config(&self) -> serde_json::Value;

    /// A descriptive schema blob, opaque to the core, describing the shape
    /// of this module's per-location config (for UI/validation use by hosts).
    fn location_config_schema(&self) -> serde_json::Value;

    /// Upgrade a config blob of any version this module has ever emitted to
    /// `current_config_version()`.
    fn migrate_config(&self, blob: serde_json::Value) -> serde_json::Value;

    /// Called after a location's config for this module changes.
    fn on_location_config_changed(&self, _location_id: &LocationId, _config: &serde_json::Value) {}

    /// Called before a location is removed from the store, so the module can
    /// clean up any runtime state it holds for that location.
    fn on_location_deleted(&self, location_id: &LocationId);
}
