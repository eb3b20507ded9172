// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sensor events flow through the bus into the occupancy module exactly as
//! they would through the direct API (spec §4.4 "Event subscription").

use chrono::{DateTime, TimeZone, Utc};
use ht_bus::{Event, EventBus};
use ht_core::{test_support, LocationId, Module};
use ht_occupancy::OccupancyModule;
use parking_lot::Mutex;
use std::sync::Arc;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[test]
fn a_published_sensor_event_triggers_occupancy_through_the_bus() {
    let store = Arc::new(Mutex::new(test_support::tree(&[("kitchen", None)])));
    let bus = Arc::new(EventBus::new());
    bus.set_location_manager(Arc::clone(&store));

    let module = OccupancyModule::new();
    store.lock().register_module(Arc::clone(&module) as Arc<dyn Module>);
    module.attach(Arc::clone(&bus), Arc::clone(&store));

    let kitchen = LocationId::new("kitchen");
    let payload = serde_json::json!({"op": "TRIGGER", "source_id": "m1", "timeout": 300});
    let event = Event::new("sensor.state_changed", "test-sensor", at(0)).location_id(kitchen.clone()).payload(payload);
    bus.publish(event);

    assert!(module.current_state(&kitchen).is_occupied);

    module.check_timeouts(at(301));
    assert!(module.current_state(&kitchen).is_occupied);
    module.check_timeouts(at(401));
    assert!(!module.current_state(&kitchen).is_occupied);
}

#[test]
fn a_payload_with_an_unknown_op_does_not_panic_the_bus() {
    let store = Arc::new(Mutex::new(test_support::tree(&[("kitchen", None)])));
    let bus = Arc::new(EventBus::new());
    bus.set_location_manager(Arc::clone(&store));

    let module = OccupancyModule::new();
    store.lock().register_module(Arc::clone(&module) as Arc<dyn Module>);
    module.attach(Arc::clone(&bus), Arc::clone(&store));

    let kitchen = LocationId::new("kitchen");
    let payload = serde_json::json!({"op": "FLY_AWAY", "source_id": "m1"});
    let event = Event::new("sensor.state_changed", "test-sensor", at(0)).location_id(kitchen.clone()).payload(payload);
    bus.publish(event);

    assert!(!module.current_state(&kitchen).is_occupied);
}
