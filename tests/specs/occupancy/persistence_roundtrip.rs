// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dumping and restoring runtime state round-trips through a fresh module
//! instance wired to the same store (spec §4.4 "State persistence").

use chrono::{Duration, TimeZone, Utc};
use ht_bus::EventBus;
use ht_core::{test_support, LocationId, Module};
use ht_occupancy::OccupancyModule;
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn a_locked_location_survives_a_restart_regardless_of_age() {
    let store = Arc::new(Mutex::new(test_support::tree(&[("office", None)])));
    let bus = Arc::new(EventBus::new());
    bus.set_location_manager(Arc::clone(&store));

    let office = LocationId::new("office");
    let saved_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

    let dump = {
        let module = OccupancyModule::new();
        store.lock().register_module(Arc::clone(&module) as Arc<dyn Module>);
        module.attach(Arc::clone(&bus), Arc::clone(&store));
        module.lock(&office, "vacation", Some(saved_at)).unwrap();
        module.dump_state(saved_at).to_value()
    };

    // A brand new module instance, as if the host had just restarted.
    let restarted = OccupancyModule::new();
    store.lock().register_module(Arc::clone(&restarted) as Arc<dyn Module>);
    restarted.attach(Arc::clone(&bus), Arc::clone(&store));

    let much_later = saved_at + Duration::days(30);
    let outcome = restarted.restore_state(&dump, much_later, 60);
    assert!(!outcome.version_mismatch);
    assert_eq!(outcome.restored, 1);
    assert!(restarted.current_state(&office).is_locked());
}
