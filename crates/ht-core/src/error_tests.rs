// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn messages_mention_the_offending_id() {
    let err = ValidationError::UnknownLocation(LocationId::new("attic"));
    assert!(err.to_string().contains("attic"));

    let err = ValidationError::Cycle {
        child: LocationId::new("house"),
        parent: LocationId::new("kitchen"),
    };
    assert!(err.to_string().contains("house"));
    assert!(err.to_string().contains("kitchen"));
}

#[test]
fn errors_are_comparable() {
    assert_eq!(ValidationError::EmptyId, ValidationError::EmptyId);
    assert_ne!(ValidationError::EmptyId, ValidationError::NegativeTimeout);
}
