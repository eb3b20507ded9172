// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-location occupancy config (spec §3.5) and its config-blob lifecycle
//! (spec §4.5): defaults, schema, and migration from every version this
//! module has ever emitted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The config schema version this build emits. Version 1 predates
/// `occupancy_strategy`/`contributes_to_parent`.
pub const CURRENT_CONFIG_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyStrategy {
    Independent,
    FollowParent,
}

ht_core::simple_display! {
    OccupancyStrategy {
        Independent => "independent",
        FollowParent => "follow_parent",
    }
}

impl Default for OccupancyStrategy {
    fn default() -> Self {
        Self::Independent
    }
}

/// Resolved per-location configuration (spec §3.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyConfig {
    pub default_timeout: Duration,
    pub hold_release_timeout: Duration,
    pub occupancy_strategy: OccupancyStrategy,
    pub contributes_to_parent: bool,
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            hold_release_timeout: Duration::from_secs(120),
            occupancy_strategy: OccupancyStrategy::Independent,
            contributes_to_parent: true,
        }
    }
}

impl OccupancyConfig {
    /// Parse a config blob that has already been migrated to
    /// [`CURRENT_CONFIG_VERSION`]. Missing fields fall back to defaults
    /// rather than erroring, since the store treats these blobs as opaque
    /// and a module default_config() is always a valid starting point.
    pub fn from_blob(blob: &serde_json::Value) -> Self {
        let defaults = Self::default();
        Self {
            default_timeout: blob
                .get("default_timeout_s")
                .and_then(serde_json::Value::as_u64)
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_timeout),
            hold_release_timeout: blob
                .get("hold_release_timeout_s")
                .and_then(serde_json::Value::as_u64)
                .map(Duration::from_secs)
                .unwrap_or(defaults.hold_release_timeout),
            occupancy_strategy: blob
                .get("occupancy_strategy")
                .and_then(serde_json::Value::as_str)
                .and_then(|s| match s {
                    "independent" => Some(OccupancyStrategy::Independent),
                    "follow_parent" => Some(OccupancyStrategy::FollowParent),
                    _ => None,
                })
                .unwrap_or(defaults.occupancy_strategy),
            contributes_to_parent: blob
                .get("contributes_to_parent")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(defaults.contributes_to_parent),
        }
    }
}

/// The default config blob a newly-configured location gets.
pub fn default_config_blob() -> serde_json::Value {
    let d = OccupancyConfig::default();
    serde_json::json!({
        "version": CURRENT_CONFIG_VERSION,
        "default_timeout_s": d.default_timeout.as_secs(),
        "hold_release_timeout_s": d.hold_release_timeout.as_secs(),
        "occupancy_strategy": d.occupancy_strategy.to_string(),
        "contributes_to_parent": d.contributes_to_parent,
    })
}

/// A descriptive, core-opaque schema for UI/validation use by hosts.
pub fn config_schema() -> serde_json::Value {
    serde_json::json!({
        "version": CURRENT_CONFIG_VERSION,
        "fields": {
            "default_timeout_s": {"type": "integer", "minimum": 0, "default": 300},
            "hold_release_timeout_s": {"type": "integer", "minimum": 0, "default": 120},
            "occupancy_strategy": {"type": "string", "enum": ["independent", "follow_parent"], "default": "independent"},
            "contributes_to_parent": {"type": "boolean", "default": true},
        },
    })
}

/// Upgrade any config blob this module has ever emitted to
/// [`CURRENT_CONFIG_VERSION`]. Version 1 blobs lack `occupancy_strategy`
/// and `contributes_to_parent`; migration adds them at their defaults.
pub fn migrate_config_blob(blob: serde_json::Value) -> serde_json::Value {
    let version = blob.get("version").and_then(serde_json::Value::as_u64).unwrap_or(1);
    if version >= CURRENT_CONFIG_VERSION as u64 {
        return blob;
    }

    let mut migrated = match blob {
        serde_json::Value::Object(map) => map,
        _ => return default_config_blob(),
    };
    let defaults = OccupancyConfig::default();
    migrated.entry("default_timeout_s").or_insert_with(|| serde_json::json!(defaults.default_timeout.as_secs()));
    migrated.entry("hold_release_timeout_s").or_insert_with(|| serde_json::json!(defaults.hold_release_timeout.as_secs()));
    migrated.entry("occupancy_strategy").or_insert_with(|| serde_json::json!(defaults.occupancy_strategy.to_string()));
    migrated.entry("contributes_to_parent").or_insert_with(|| serde_json::json!(defaults.contributes_to_parent));
    migrated.insert("version".to_string(), serde_json::json!(CURRENT_CONFIG_VERSION));
    serde_json::Value::Object(migrated)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
