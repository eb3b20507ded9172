// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `LocationStore` — the mutable, queryable location tree (spec §4.1).
//!
//! Single-writer: every mutating method takes `&mut self`. A host sharing a
//! store across threads is expected to serialize access itself (e.g. behind
//! a `parking_lot::Mutex`), the way the teacher's daemon wraps its
//! `MaterializedState` rather than pushing locking into the state type.

use crate::error::ValidationError;
use crate::ids::{EntityId, LocationId, ModuleId};
use crate::location::Location;
use crate::module::Module;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// How `update_location` should treat `parent_id`.
///
/// Modeled as `Option<Option<LocationId>>` rather than spec.md's
/// language-neutral empty-string sentinel: `None` means "keep current",
/// `Some(None)` means "clear to top-level", `Some(Some(id))` means "set".
pub type ParentUpdate = Option<Option<LocationId>>;

/// The mutable tree of [`Location`]s, their entity mappings, and the modules
/// registered to observe deletions.
#[derive(Default)]
pub struct LocationStore {
    locations: IndexMap<LocationId, Location>,
    children: HashMap<LocationId, Vec<LocationId>>,
    entity_index: HashMap<EntityId, LocationId>,
    modules: Vec<Arc<dyn Module>>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behavior module so its `on_location_deleted` hook fires
    /// during `delete_location`.
    pub fn register_module(&mut self, module: Arc<dyn Module>) {
        self.modules.push(module);
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    pub fn create_location(
        &mut self,
        id: impl Into<LocationId>,
        name: impl Into<String>,
        parent_id: Option<LocationId>,
        is_explicit_root: bool,
        ha_area_id: Option<String>,
        aliases: Vec<String>,
    ) -> Result<Location, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.locations.contains_key(&id) {
            return Err(ValidationError::DuplicateLocation(id));
        }
        if let Some(parent) = &parent_id {
            if *parent == id {
                return Err(ValidationError::SelfParent(id));
            }
            if !self.locations.contains_key(parent) {
                return Err(ValidationError::UnknownParent(parent.clone()));
            }
        }

        let aliases = dedupe_preserve_order(aliases);
        let location = Location::new(id.clone(), name.into(), parent_id.clone(), is_explicit_root, ha_area_id, aliases);

        if let Some(parent) = &parent_id {
            self.children.entry(parent.clone()).or_default().push(id.clone());
        }
        self.locations.insert(id.clone(), location.clone());
        debug!(location = %id, "location created");
        Ok(location)
    }

    pub fn update_location(
        &mut self,
        id: &LocationId,
        name: Option<String>,
        parent_id: ParentUpdate,
        aliases: Option<Vec<String>>,
    ) -> Result<Location, ValidationError> {
        if !self.locations.contains_key(id) {
            return Err(ValidationError::UnknownLocation(id.clone()));
        }

        if let Some(Some(parent)) = &parent_id {
            if parent == id {
                return Err(ValidationError::SelfParent(id.clone()));
            }
            if !self.locations.contains_key(parent) {
                return Err(ValidationError::UnknownParent(parent.clone()));
            }
            if self.is_ancestor(id, parent) {
                return Err(ValidationError::Cycle { child: id.clone(), parent: parent.clone() });
            }
        }

        let old_parent = self.locations.get(id).and_then(|l| l.parent_id.clone());
        let reparented = parent_id.is_some();

        let Some(loc) = self.locations.get_mut(id) else {
            return Err(ValidationError::UnknownLocation(id.clone()));
        };
        if let Some(name) = name {
            loc.name = name;
        }
        if let Some(aliases) = aliases {
            loc.aliases = dedupe_preserve_order(aliases);
        }
        if let Some(new_parent) = &parent_id {
            loc.parent_id = new_parent.clone();
        }
        let updated = loc.clone();

        if reparented {
            if let Some(old) = &old_parent {
                if let Some(siblings) = self.children.get_mut(old) {
                    siblings.retain(|c| c != id);
                }
            }
            if let Some(Some(parent)) = parent_id {
                self.children.entry(parent).or_default().push(id.clone());
            }
        }

        debug!(location = %id, "location updated");
        Ok(updated)
    }

    pub fn delete_location(&mut self, id: &LocationId, cascade: bool, orphan_children: bool) -> Result<Vec<LocationId>, ValidationError> {
        if !self.locations.contains_key(id) {
            return Err(ValidationError::UnknownLocation(id.clone()));
        }

        let direct_children = self.children.get(id).cloned().unwrap_or_default();

        if direct_children.is_empty() {
            self.notify_deleted(id);
            self.remove_location_data(id);
            debug!(location = %id, "location deleted");
            return Ok(vec![id.clone()]);
        }

        if cascade {
            let mut order = self.descendants_of_ids(id);
            order.reverse();
            order.push(id.clone());
            for victim in &order {
                self.notify_deleted(victim);
            }
            for victim in &order {
                self.remove_location_data(victim);
            }
            debug!(location = %id, count = order.len(), "location cascade deleted");
            return Ok(order);
        }

        if orphan_children {
            for child in &direct_children {
                if let Some(loc) = self.locations.get_mut(child) {
                    loc.parent_id = None;
                    loc.is_explicit_root = false;
                }
            }
            self.children.remove(id);
            self.notify_deleted(id);
            self.remove_location_data(id);
            debug!(location = %id, orphaned = direct_children.len(), "location deleted, children orphaned");
            return Ok(vec![id.clone()]);
        }

        Err(ValidationError::HasChildren(id.clone()))
    }

    fn notify_deleted(&self, id: &LocationId) {
        for module in &self.modules {
            let module = Arc::clone(module);
            let id = id.clone();
            let result = catch_unwind(AssertUnwindSafe(|| module.on_location_deleted(&id)));
            if result.is_err() {
                warn!(location = %id, module = module.id(), "on_location_deleted hook panicked");
            }
        }
    }

    /// Strips a single location out of every map. Caller is responsible for
    /// having already invoked `notify_deleted` and for having detached it
    /// from its parent's children list (cascade/orphan paths do this up
    /// front; the simple leaf path relies on this helper for the parent link).
    fn remove_location_data(&mut self, id: &LocationId) {
        if let Some(loc) = self.locations.shift_remove(id) {
            for entity in &loc.entity_ids {
                self.entity_index.remove(entity);
            }
            if let Some(parent) = &loc.parent_id {
                if let Some(siblings) = self.children.get_mut(parent) {
                    siblings.retain(|c| c != id);
                }
            }
        }
        self.children.remove(id);
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn get(&self, id: &LocationId) -> Option<&Location> {
        self.locations.get(id)
    }

    pub fn parent_of(&self, id: &LocationId) -> Option<&Location> {
        let parent_id = self.locations.get(id)?.parent_id.as_ref()?;
        self.locations.get(parent_id)
    }

    pub fn children_of(&self, id: &LocationId) -> Vec<&Location> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.locations.get(c)).collect())
            .unwrap_or_default()
    }

    /// Nearest-first, excludes `id` itself. Bounded by the store's current
    /// size so a corrupted parent chain can never recurse unboundedly.
    pub fn ancestors_of(&self, id: &LocationId) -> Vec<&Location> {
        let mut out = Vec::new();
        let mut current = self.locations.get(id).and_then(|l| l.parent_id.clone());
        let mut seen = std::collections::HashSet::new();
        while let Some(parent_id) = current {
            if !seen.insert(parent_id.clone()) {
                break;
            }
            match self.locations.get(&parent_id) {
                Some(loc) => {
                    out.push(loc);
                    current = loc.parent_id.clone();
                }
                None => break,
            }
            if out.len() > self.locations.len() {
                break;
            }
        }
        out
    }

    fn ancestors_of_ids(&self, id: &LocationId) -> Vec<LocationId> {
        self.ancestors_of(id).into_iter().map(|l| l.id.clone()).collect()
    }

    pub fn is_ancestor(&self, candidate: &LocationId, of: &LocationId) -> bool {
        self.ancestors_of_ids(of).iter().any(|a| a == candidate)
    }

    pub fn is_descendant(&self, candidate: &LocationId, of: &LocationId) -> bool {
        self.is_ancestor(of, candidate)
    }

    /// Pre-order, excludes `id` itself.
    pub fn descendants_of(&self, id: &LocationId) -> Vec<&Location> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, id: &LocationId, out: &mut Vec<&'a Location>) {
        for child_id in self.children.get(id).into_iter().flatten() {
            if let Some(child) = self.locations.get(child_id) {
                out.push(child);
                self.collect_descendants(child_id, out);
            }
        }
    }

    pub(crate) fn descendants_of_ids(&self, id: &LocationId) -> Vec<LocationId> {
        self.descendants_of(id).into_iter().map(|l| l.id.clone()).collect()
    }

    pub fn all_locations(&self) -> Vec<&Location> {
        self.locations.values().collect()
    }

    pub fn get_root_locations(&self) -> Vec<&Location> {
        self.locations.values().filter(|l| l.is_root()).collect()
    }

    pub fn get_unassigned_locations(&self) -> Vec<&Location> {
        self.locations.values().filter(|l| l.is_unassigned()).collect()
    }

    pub fn get_location_by_name(&self, name: &str) -> Option<&Location> {
        self.locations.values().find(|l| l.name == name)
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&Location> {
        self.locations.values().find(|l| l.aliases.iter().any(|a| a == alias))
    }

    // ---------------------------------------------------------------
    // Entity mapping
    // ---------------------------------------------------------------

    pub fn add_entity_to_location(&mut self, entity_id: EntityId, location_id: &LocationId) -> Result<(), ValidationError> {
        if entity_id.is_empty() {
            return Err(ValidationError::EmptyEntityId);
        }
        if !self.locations.contains_key(location_id) {
            return Err(ValidationError::UnknownLocation(location_id.clone()));
        }
        self.detach_entity(&entity_id);
        if let Some(loc) = self.locations.get_mut(location_id) {
            loc.entity_ids.push(entity_id.clone());
        }
        self.entity_index.insert(entity_id, location_id.clone());
        Ok(())
    }

    pub fn add_entities_to_location(&mut self, ids: Vec<EntityId>, location_id: &LocationId) -> Result<(), ValidationError> {
        if !self.locations.contains_key(location_id) {
            return Err(ValidationError::UnknownLocation(location_id.clone()));
        }
        for id in ids {
            self.add_entity_to_location(id, location_id)?;
        }
        Ok(())
    }

    pub fn remove_entities_from_location(&mut self, ids: &[EntityId]) {
        for id in ids {
            self.detach_entity(id);
        }
    }

    pub fn move_entities(&mut self, ids: &[EntityId], to_location_id: &LocationId) -> Result<(), ValidationError> {
        if !self.locations.contains_key(to_location_id) {
            return Err(ValidationError::UnknownLocation(to_location_id.clone()));
        }
        for id in ids {
            self.detach_entity(id);
            if let Some(loc) = self.locations.get_mut(to_location_id) {
                loc.entity_ids.push(id.clone());
            }
            self.entity_index.insert(id.clone(), to_location_id.clone());
        }
        Ok(())
    }

    fn detach_entity(&mut self, entity_id: &EntityId) {
        if let Some(old_location) = self.entity_index.remove(entity_id) {
            if let Some(loc) = self.locations.get_mut(&old_location) {
                loc.entity_ids.retain(|e| e != entity_id);
            }
        }
    }

    pub fn get_entity_location(&self, entity_id: &EntityId) -> Option<&LocationId> {
        self.entity_index.get(entity_id)
    }

    pub fn get_entities_in_location(&self, location_id: &LocationId) -> Vec<EntityId> {
        self.locations.get(location_id).map(|l| l.entity_ids.clone()).unwrap_or_default()
    }

    /// The full entity → location reverse index, for use by the integrity
    /// validator. Not part of the day-to-day query API.
    pub fn entity_mappings(&self) -> Vec<(EntityId, LocationId)> {
        self.entity_index.iter().map(|(e, l)| (e.clone(), l.clone())).collect()
    }

    /// Repair hook for `auto_repair`'s orphaned-entity case: drop a reverse
    /// index entry (and any stray location-side reference) for an entity
    /// whose mapped location no longer exists.
    pub fn drop_orphaned_entity(&mut self, entity_id: &EntityId) {
        self.detach_entity(entity_id);
    }

    /// Repair hook for `auto_repair`'s duplicate-entity case: make
    /// `keep_location` the sole owner of `entity_id`, stripping it out of
    /// every other location's `entity_ids` and repointing the reverse index.
    pub fn resolve_duplicate_entity(&mut self, entity_id: &EntityId, keep_location: &LocationId) {
        for (id, location) in self.locations.iter_mut() {
            if id != keep_location {
                location.entity_ids.retain(|e| e != entity_id);
            }
        }
        self.entity_index.insert(entity_id.clone(), keep_location.clone());
    }

    // ---------------------------------------------------------------
    // Module config
    // ---------------------------------------------------------------

    pub fn set_module_config(&mut self, location_id: &LocationId, module_id: &ModuleId, blob: serde_json::Value) -> Result<(), ValidationError> {
        if !self.locations.contains_key(location_id) {
            return Err(ValidationError::UnknownLocation(location_id.clone()));
        }
        validate_module_config_blob(location_id, module_id, &blob)?;
        if let Some(loc) = self.locations.get_mut(location_id) {
            loc.modules.insert(module_id.clone(), blob.clone());
        }

        for module in &self.modules {
            if module.id() == module_id.as_str() {
                let module = Arc::clone(module);
                let location_id = location_id.clone();
                let blob = blob.clone();
                let result = catch_unwind(AssertUnwindSafe(|| module.on_location_config_changed(&location_id, &blob)));
                if result.is_err() {
                    warn!(location = %location_id, module = %module_id, "on_location_config_changed hook panicked");
                }
            }
        }
        Ok(())
    }

    pub fn get_module_config(&self, location_id: &LocationId, module_id: &ModuleId) -> Option<&serde_json::Value> {
        self.locations.get(location_id)?.modules.get(module_id)
    }

    pub fn remove_module_config(&mut self, location_id: &LocationId, module_id: &ModuleId) {
        if let Some(loc) = self.locations.get_mut(location_id) {
            loc.modules.remove(module_id);
        }
    }

    // ---------------------------------------------------------------
    // Aliases
    // ---------------------------------------------------------------

    pub fn add_alias(&mut self, location_id: &LocationId, alias: impl Into<String>) -> Result<(), ValidationError> {
        let loc = self.locations.get_mut(location_id).ok_or_else(|| ValidationError::UnknownLocation(location_id.clone()))?;
        let alias = alias.into();
        if !loc.aliases.iter().any(|a| a == &alias) {
            loc.aliases.push(alias);
        }
        Ok(())
    }

    pub fn add_aliases(&mut self, location_id: &LocationId, aliases: Vec<String>) -> Result<(), ValidationError> {
        for alias in aliases {
            self.add_alias(location_id, alias)?;
        }
        Ok(())
    }

    pub fn remove_alias(&mut self, location_id: &LocationId, alias: &str) -> Result<(), ValidationError> {
        let loc = self.locations.get_mut(location_id).ok_or_else(|| ValidationError::UnknownLocation(location_id.clone()))?;
        loc.aliases.retain(|a| a != alias);
        Ok(())
    }

    pub fn set_aliases(&mut self, location_id: &LocationId, aliases: Vec<String>) -> Result<(), ValidationError> {
        let loc = self.locations.get_mut(location_id).ok_or_else(|| ValidationError::UnknownLocation(location_id.clone()))?;
        loc.aliases = dedupe_preserve_order(aliases);
        Ok(())
    }
}

/// Raw, invariant-bypassing mutators used only to manufacture corrupted
/// stores for the integrity validator's test suite. Never used by
/// production code paths.
#[cfg(any(test, feature = "test-support"))]
impl LocationStore {
    pub fn test_set_parent_unchecked(&mut self, id: &LocationId, parent: Option<LocationId>) {
        if let Some(loc) = self.locations.get_mut(id) {
            loc.parent_id = parent;
        }
    }

    pub fn test_remove_location_unchecked(&mut self, id: &LocationId) {
        self.locations.shift_remove(id);
    }

    /// Push an entity id into a location's `entity_ids` without touching
    /// the reverse index, to manufacture a duplicate-entity corruption.
    pub fn test_push_entity_unchecked(&mut self, id: &LocationId, entity_id: EntityId) {
        if let Some(loc) = self.locations.get_mut(id) {
            loc.entity_ids.push(entity_id);
        }
    }
}

fn validate_module_config_blob(location_id: &LocationId, module_id: &ModuleId, blob: &serde_json::Value) -> Result<(), ValidationError> {
    match blob {
        serde_json::Value::Null => Ok(()),
        serde_json::Value::Object(map) if map.is_empty() => Ok(()),
        serde_json::Value::Object(map) => match map.get("version") {
            Some(serde_json::Value::Number(n)) if n.as_u64().is_some_and(|v| v > 0) => Ok(()),
            _ => Err(ValidationError::InvalidModuleConfigVersion {
                location: location_id.clone(),
                module: module_id.to_string(),
            }),
        },
        _ => Err(ValidationError::InvalidModuleConfigVersion {
            location: location_id.clone(),
            module: module_id.to_string(),
        }),
    }
}

fn dedupe_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
