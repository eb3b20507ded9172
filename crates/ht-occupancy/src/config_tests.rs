// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_config_blob_round_trips_through_from_blob() {
    let blob = default_config_blob();
    let config = OccupancyConfig::from_blob(&blob);
    assert_eq!(config, OccupancyConfig::default());
}

#[test]
fn migrate_adds_missing_fields_to_a_v1_blob() {
    let v1 = serde_json::json!({ "version": 1 });
    let migrated = migrate_config_blob(v1);
    assert_eq!(migrated["version"], CURRENT_CONFIG_VERSION);
    assert_eq!(migrated["occupancy_strategy"], "independent");
    assert_eq!(migrated["contributes_to_parent"], true);
    assert_eq!(migrated["default_timeout_s"], 300);
}

#[test]
fn migrate_leaves_a_current_blob_untouched() {
    let v2 = serde_json::json!({
        "version": CURRENT_CONFIG_VERSION,
        "default_timeout_s": 600,
        "hold_release_timeout_s": 60,
        "occupancy_strategy": "follow_parent",
        "contributes_to_parent": false,
    });
    let migrated = migrate_config_blob(v2.clone());
    assert_eq!(migrated, v2);
}

#[test]
fn migrate_tolerates_a_missing_or_non_object_blob() {
    let migrated = migrate_config_blob(serde_json::Value::Null);
    assert_eq!(migrated["version"], CURRENT_CONFIG_VERSION);
}

#[test]
fn from_blob_falls_back_to_defaults_for_unknown_strategy_strings() {
    let blob = serde_json::json!({ "version": 2, "occupancy_strategy": "nonsense" });
    let config = OccupancyConfig::from_blob(&blob);
    assert_eq!(config.occupancy_strategy, OccupancyStrategy::Independent);
}
