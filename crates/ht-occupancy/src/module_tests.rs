// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use ht_core::test_support;
use ht_core::{FakeClock, LocationStore};
use std::sync::Mutex as StdMutex;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

type Fixture = (Arc<OccupancyModule<FakeClock>>, Arc<EventBus>, Arc<parking_lot::Mutex<LocationStore>>, FakeClock, Arc<StdMutex<Vec<Event>>>);

fn setup(edges: &[(&str, Option<&str>)]) -> Fixture {
    let store = Arc::new(parking_lot::Mutex::new(test_support::tree(edges)));
    let bus = Arc::new(EventBus::new());
    bus.set_location_manager(Arc::clone(&store));

    let clock = FakeClock::new();
    let module = OccupancyModule::with_clock(clock.clone());
    store.lock().register_module(Arc::clone(&module) as Arc<dyn Module>);
    module.attach(Arc::clone(&bus), Arc::clone(&store));

    let events = Arc::new(StdMutex::new(Vec::new()));
    let recorder = Arc::clone(&events);
    bus.subscribe(
        Subscription::new(Arc::new(move |event: &Event| {
            recorder.lock().unwrap().push(event.clone());
            Ok(())
        }))
        .event_type("occupancy.changed"),
    );

    (module, bus, store, clock, events)
}

fn loc(id: &str) -> LocationId {
    LocationId::new(id)
}

#[test]
fn motion_pulse_extends_scenario() {
    // spec §8 end-to-end scenario 1.
    let (module, _bus, _store, clock, events) = setup(&[("kitchen", None)]);
    let kitchen = loc("kitchen");

    clock.set(at(0));
    module.trigger(&kitchen, "m1", Some(300), None).unwrap();
    clock.set(at(100));
    module.trigger(&kitchen, "m1", Some(300), None).unwrap();

    module.check_timeouts(at(301));
    assert!(module.current_state(&kitchen).is_occupied);

    module.check_timeouts(at(401));
    assert!(!module.current_state(&kitchen).is_occupied);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
}

#[test]
fn hold_survives_motion_scenario() {
    // spec §8 end-to-end scenario 2.
    let (module, _bus, _store, _clock, _events) = setup(&[("office", None)]);
    let office = loc("office");

    module.trigger(&office, "m1", Some(60), Some(at(0))).unwrap();
    module.hold(&office, "p1", Some(at(10))).unwrap();
    module.release(&office, "p1", Some(30), Some(at(100))).unwrap();
    assert_eq!(module.current_state(&office).occupied_until, Some(at(130)));

    module.check_timeouts(at(131));
    assert!(!module.current_state(&office).is_occupied);
}

#[test]
fn lock_suspends_and_resumes_scenario() {
    // spec §8 end-to-end scenario 3.
    let (module, _bus, _store, _clock, _events) = setup(&[("bedroom", None)]);
    let bedroom = loc("bedroom");

    module.trigger(&bedroom, "m1", Some(600), Some(at(0))).unwrap();
    assert_eq!(module.current_state(&bedroom).occupied_until, Some(at(600)));

    module.lock(&bedroom, "vacation", Some(at(100))).unwrap();
    assert_eq!(module.current_state(&bedroom).occupied_until, None);
    assert_eq!(module.current_state(&bedroom).timer_remaining, Some(std::time::Duration::from_secs(500)));

    module.unlock(&bedroom, "vacation", Some(at(10_000))).unwrap();
    assert_eq!(module.current_state(&bedroom).occupied_until, Some(at(10_500)));

    // no expiry at the original t=600 instant: the location was locked then.
    module.check_timeouts(at(600));
    assert!(module.current_state(&bedroom).is_occupied);

    module.check_timeouts(at(10_501));
    assert!(!module.current_state(&bedroom).is_occupied);
}

#[test]
fn upward_propagation_with_multiple_children_scenario() {
    // spec §8 end-to-end scenario 4.
    let (module, _bus, _store, _clock, _events) =
        setup(&[("house", None), ("main_floor", Some("house")), ("kitchen", Some("main_floor")), ("living", Some("main_floor"))]);
    let house = loc("house");
    let main_floor = loc("main_floor");
    let kitchen = loc("kitchen");
    let living = loc("living");

    module.trigger(&kitchen, "m1", Some(300), Some(at(0))).unwrap();
    module.trigger(&living, "m1", Some(600), Some(at(50))).unwrap();

    assert!(module.current_state(&main_floor).is_occupied);
    assert!(module.current_state(&house).is_occupied);
    assert_eq!(module.get_effective_timeout(&house, at(0)), Some(at(650)));

    module.check_timeouts(at(301));
    assert!(!module.current_state(&kitchen).is_occupied);
    assert!(module.current_state(&living).is_occupied);
    assert!(module.current_state(&main_floor).is_occupied);
    assert!(module.current_state(&house).is_occupied);

    module.check_timeouts(at(651));
    assert!(!module.current_state(&living).is_occupied);
    assert!(!module.current_state(&main_floor).is_occupied);
    assert!(!module.current_state(&house).is_occupied);
}

#[test]
fn a_held_child_clears_a_pre_existing_ancestor_timer_instead_of_leaking_it() {
    // spec §4.4 rule 2: the held-style transition sets occupied_until = None
    // outright, even if the ancestor already carried a real timer from its
    // own trigger or a sibling's propagated trigger.
    let (module, _bus, _store, _clock, events) = setup(&[("house", None), ("kitchen", Some("house")), ("office", Some("house"))]);
    let house = loc("house");
    let kitchen = loc("kitchen");
    let office = loc("office");

    module.trigger(&office, "m1", Some(1000), Some(at(0))).unwrap();
    assert_eq!(module.current_state(&house).occupied_until, Some(at(1000)));

    module.hold(&kitchen, "p1", Some(at(10))).unwrap();
    let house_state = module.current_state(&house);
    assert_eq!(house_state.occupied_until, None);
    assert!(house_state.active_holds.contains("kitchen"));
    assert!(house_state.is_occupied);

    let payload = events.lock().unwrap().last().cloned().unwrap().payload;
    assert!(payload.get("occupied_until").unwrap().is_null());
}

#[test]
fn vacate_area_skips_locked_locations_by_default() {
    // spec §8 end-to-end scenario 5.
    let (module, _bus, _store, _clock, _events) = setup(&[("house", None), ("office", Some("house")), ("kitchen", Some("house"))]);
    let office = loc("office");
    let kitchen = loc("kitchen");

    module.lock(&office, "cleaning", Some(at(0))).unwrap();
    module.trigger(&kitchen, "m1", Some(300), Some(at(10))).unwrap();

    let transitioned = module.vacate_area(&loc("house"), false, Some(at(20))).unwrap();
    assert!(transitioned.contains(&kitchen));
    assert!(!transitioned.contains(&office));
    assert!(module.current_state(&office).is_locked());
}

#[test]
fn vacate_area_unlocks_then_vacates_when_include_locked() {
    let (module, _bus, _store, _clock, _events) = setup(&[("house", None), ("office", Some("house"))]);
    let office = loc("office");

    module.lock(&office, "cleaning", Some(at(0))).unwrap();
    module.trigger(&office, "m1", Some(300), Some(at(0))).unwrap();

    let transitioned = module.vacate_area(&loc("house"), true, Some(at(20))).unwrap();
    assert!(transitioned.contains(&office));
    assert!(!module.current_state(&office).is_locked());
    assert!(!module.current_state(&office).is_occupied);
}

#[test]
fn deletion_cascade_drops_runtime_state() {
    // spec §8 end-to-end scenario 6.
    let (module, _bus, store, _clock, _events) = setup(&[("house", None), ("main_floor", Some("house")), ("kitchen", Some("main_floor"))]);
    let kitchen = loc("kitchen");

    module.trigger(&kitchen, "m1", Some(300), Some(at(0))).unwrap();
    assert!(module.current_state(&kitchen).is_occupied);

    let deleted = store.lock().delete_location(&loc("main_floor"), true, false).unwrap();
    assert_eq!(deleted, vec![kitchen.clone(), loc("main_floor")]);

    assert!(!module.current_state(&kitchen).is_occupied);
}

#[test]
fn operations_against_an_unknown_location_are_validation_errors() {
    let (module, _bus, _store, _clock, _events) = setup(&[]);
    let err = module.trigger(&loc("nowhere"), "m1", None, Some(at(0))).unwrap_err();
    assert_eq!(err, ValidationError::UnknownLocation(loc("nowhere")));
}

#[test]
fn follow_parent_child_mirrors_parent_occupancy_and_drops_its_own_ops() {
    // spec §4.3 "Follow-parent strategy".
    let (module, _bus, store, _clock, events) = setup(&[("house", None), ("display", Some("house"))]);
    let house = loc("house");
    let display = loc("display");
    store
        .lock()
        .set_module_config(&display, &ModuleId::new("occupancy"), serde_json::json!({"version": 2, "occupancy_strategy": "follow_parent"}))
        .unwrap();

    module.trigger(&house, "m1", Some(300), Some(at(0))).unwrap();
    assert!(module.current_state(&display).is_occupied);
    assert_eq!(module.current_state(&display).occupied_until, module.current_state(&house).occupied_until);

    // Operations addressed directly to a follow-parent location are dropped.
    module.vacate(&display, Some(at(1))).unwrap();
    assert!(module.current_state(&display).is_occupied);

    module.check_timeouts(at(301));
    assert!(!module.current_state(&house).is_occupied);
    assert!(!module.current_state(&display).is_occupied);

    let reasons: Vec<String> = events.lock().unwrap().iter().filter_map(|e| e.payload.get("reason")?.as_str().map(String::from)).collect();
    assert!(reasons.iter().any(|r| r.starts_with("follows:")));
}

#[test]
fn redundant_triggers_with_no_observable_change_do_not_emit() {
    let (module, _bus, _store, _clock, events) = setup(&[("kitchen", None)]);
    let kitchen = loc("kitchen");

    module.trigger(&kitchen, "m1", Some(300), Some(at(0))).unwrap();
    // A shorter trigger extends nothing: occupied_until and is_occupied are unchanged.
    module.trigger(&kitchen, "m1", Some(10), Some(at(0))).unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
}
