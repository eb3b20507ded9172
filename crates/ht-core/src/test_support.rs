// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only helpers shared across crates (enabled by the `test-support`
//! feature). Not part of the public, stability-guaranteed API.

use crate::ids::LocationId;
use crate::store::LocationStore;

/// Build a store from a flat `(id, parent_id)` list, in order, so callers
/// in other crates don't have to repeat `create_location` boilerplate for
/// every fixture tree. Parents must appear before their children.
///
/// ```ignore
/// let store = ht_core::test_support::tree(&[
///     ("house", None),
///     ("kitchen", Some("house")),
///     ("pantry", Some("kitchen")),
/// ]);
/// ```
pub fn tree(edges: &[(&str, Option<&str>)]) -> LocationStore {
    let mut store = LocationStore::new();
    for (id, parent) in edges {
        let parent_id = parent.map(LocationId::new);
        store
            .create_location(*id, *id, parent_id, parent.is_none(), None, vec![])
            .expect("test_support::tree built an invalid fixture");
    }
    store
}
