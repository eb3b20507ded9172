// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A location's occupancy config blob is resolved lazily from the store and
//! migrated in place through the `Module` trait (spec §4.5).

use chrono::{TimeZone, Utc};
use ht_bus::EventBus;
use ht_core::{test_support, LocationId, Module, ModuleId};
use ht_occupancy::OccupancyModule;
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn a_v1_config_blob_without_strategy_or_contributes_still_resolves_to_current_defaults() {
    let store = Arc::new(Mutex::new(test_support::tree(&[("office", None)])));
    let bus = Arc::new(EventBus::new());
    bus.set_location_manager(Arc::clone(&store));

    let module = OccupancyModule::new();
    store.lock().register_module(Arc::clone(&module) as Arc<dyn Module>);
    module.attach(Arc::clone(&bus), Arc::clone(&store));

    let office = LocationId::new("office");
    let occupancy_id = ModuleId::new("occupancy");
    store.lock().set_module_config(&office, &occupancy_id, serde_json::json!({"version": 1, "default_timeout_s": 45})).unwrap();

    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    module.trigger(&office, "m1", None, Some(now)).unwrap();
    assert_eq!(module.current_state(&office).occupied_until, Some(now + chrono::Duration::seconds(45)));
}

#[test]
fn a_location_with_no_stored_config_falls_back_to_module_defaults() {
    let store = Arc::new(Mutex::new(test_support::tree(&[("hallway", None)])));
    let bus = Arc::new(EventBus::new());
    bus.set_location_manager(Arc::clone(&store));

    let module = OccupancyModule::new();
    store.lock().register_module(Arc::clone(&module) as Arc<dyn Module>);
    module.attach(Arc::clone(&bus), Arc::clone(&store));

    let hallway = LocationId::new("hallway");
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    module.trigger(&hallway, "m1", None, Some(now)).unwrap();
    assert_eq!(module.current_state(&hallway).occupied_until, Some(now + chrono::Duration::seconds(300)));
}
