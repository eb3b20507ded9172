// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Location` data type — a node in the home's spatial tree.

use crate::ids::{EntityId, LocationId, ModuleId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node in the home's spatial tree (room, floor, zone, building, outdoor area).
///
/// The store never interprets `modules` contents beyond the `version` field
/// convention; all other semantics belong to the module that owns the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub parent_id: Option<LocationId>,
    /// Meaningful only when `parent_id` is `None`: true for an intentional
    /// top-level root, false for the "unassigned/inbox" bucket.
    pub is_explicit_root: bool,
    /// Opaque cross-reference to an external platform area.
    pub ha_area_id: Option<String>,
    pub entity_ids: Vec<EntityId>,
    pub aliases: Vec<String>,
    pub modules: HashMap<ModuleId, serde_json::Value>,
}

impl Location {
    pub(crate) fn new(
        id: LocationId,
        name: String,
        parent_id: Option<LocationId>,
        is_explicit_root: bool,
        ha_area_id: Option<String>,
        aliases: Vec<String>,
    ) -> Self {
        Self {
            id,
            name,
            parent_id,
            is_explicit_root,
            ha_area_id,
            entity_ids: Vec::new(),
            aliases,
            modules: HashMap::new(),
        }
    }

    /// A root is a top-level location intentionally marked as such.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none() && self.is_explicit_root
    }

    /// The "unassigned/inbox" bucket: top-level but not an intentional root.
    pub fn is_unassigned(&self) -> bool {
        self.parent_id.is_none() && !self.is_explicit_root
    }
}

#[cfg(test)]
#[path = "location_tests.rs"]
mod tests;
