// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store and bus wired together: ancestor/descendant-aware subscription
//! matching (spec §4.2) and integrity validation over a live tree (spec §4.1).

use chrono::{TimeZone, Utc};
use ht_bus::{Event, EventBus, Subscription};
use ht_core::{test_support, validate_integrity, IssueKind, LocationId};
use parking_lot::Mutex;
use std::sync::{Arc, Mutex as StdMutex};

#[test]
fn a_subscription_with_include_descendants_sees_events_from_children() {
    let store = Arc::new(Mutex::new(test_support::tree(&[
        ("house", None),
        ("main_floor", Some("house")),
        ("kitchen", Some("main_floor")),
    ])));
    let bus = EventBus::new();
    bus.set_location_manager(Arc::clone(&store));

    let seen = Arc::new(StdMutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    bus.subscribe(
        Subscription::new(Arc::new(move |event: &Event| {
            recorder.lock().unwrap().push(event.location_id.clone());
            Ok(())
        }))
        .location_id(LocationId::new("house"))
        .include_descendants(true),
    );

    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    bus.publish(Event::new("occupancy.changed", "test", now).location_id(LocationId::new("kitchen")));
    bus.publish(Event::new("occupancy.changed", "test", now).location_id(LocationId::new("house")));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
}

#[test]
fn a_subscription_without_include_descendants_only_matches_the_exact_location() {
    let store = Arc::new(Mutex::new(test_support::tree(&[("house", None), ("kitchen", Some("house"))])));
    let bus = EventBus::new();
    bus.set_location_manager(Arc::clone(&store));

    let seen = Arc::new(StdMutex::new(0u32));
    let counter = Arc::clone(&seen);
    bus.subscribe(Subscription::new(Arc::new(move |_event: &Event| {
        *counter.lock().unwrap() += 1;
        Ok(())
    }))
    .location_id(LocationId::new("house")));

    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    bus.publish(Event::new("occupancy.changed", "test", now).location_id(LocationId::new("kitchen")));
    assert_eq!(*seen.lock().unwrap(), 0);
}

#[test]
fn validate_integrity_reports_a_broken_parent_pointer() {
    let mut store = test_support::tree(&[("kitchen", None)]);
    store.test_set_parent_unchecked(&LocationId::new("kitchen"), Some(LocationId::new("nowhere")));

    let issues = validate_integrity(&store);
    assert!(issues.iter().any(|i| i.kind == IssueKind::BrokenParent && i.location_id.as_ref() == Some(&LocationId::new("kitchen"))));
}
