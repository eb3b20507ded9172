// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integrity validation for a [`crate::LocationStore`] (spec §4.1).
//!
//! `validate_integrity` is a pure read-only scan; nothing here mutates the
//! store. `auto_repair` is the only function that does, and it only handles
//! the three issue kinds spec.md names as auto-repairable.

use crate::ids::{EntityId, LocationId, ModuleId};
use crate::store::LocationStore;
use std::collections::HashMap;
use tracing::warn;

/// The kind of corruption an [`IntegrityIssue`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    BrokenParent,
    Cycle,
    OrphanedEntity,
    DuplicateEntity,
    EmptyLocation,
}

crate::simple_display! {
    IssueKind {
        BrokenParent => "broken-parent",
        Cycle => "cycle",
        OrphanedEntity => "orphaned-entity",
        DuplicateEntity => "duplicate-entity",
        EmptyLocation => "empty-location",
    }
}

/// How serious an [`IntegrityIssue`] is. Doesn't gate `auto_repair`
/// eligibility on its own — that's determined by `IssueKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntegritySeverity {
    Info,
    Warning,
    Error,
}

/// One finding from `validate_integrity`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityIssue {
    pub kind: IssueKind,
    pub location_id: Option<LocationId>,
    pub entity_id: Option<EntityId>,
    pub module_id: Option<ModuleId>,
    pub severity: IntegritySeverity,
    pub details: String,
}

/// Outcome of `auto_repair`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    Repaired,
    NotRepaired,
}

/// Scan `store` for the five corruption classes spec.md names, in order:
/// broken-parent, cycle, orphaned-entity, duplicate-entity, empty-location.
pub fn validate_integrity(store: &LocationStore) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    for location in store.all_locations() {
        if let Some(parent) = &location.parent_id {
            if store.get(parent).is_none() {
                issues.push(IntegrityIssue {
                    kind: IssueKind::BrokenParent,
                    location_id: Some(location.id.clone()),
                    entity_id: None,
                    module_id: None,
                    severity: IntegritySeverity::Error,
                    details: format!("parent '{parent}' does not exist"),
                });
            }
        }
    }

    for location in store.all_locations() {
        if store.ancestors_of(&location.id).iter().any(|a| a.id == location.id) {
            issues.push(IntegrityIssue {
                kind: IssueKind::Cycle,
                location_id: Some(location.id.clone()),
                entity_id: None,
                module_id: None,
                severity: IntegritySeverity::Error,
                details: format!("'{}' appears in its own ancestry", location.id),
            });
        }
    }

    for (entity_id, location_id) in store.entity_mappings() {
        if store.get(&location_id).is_none() {
            issues.push(IntegrityIssue {
                kind: IssueKind::OrphanedEntity,
                location_id: Some(location_id.clone()),
                entity_id: Some(entity_id.clone()),
                module_id: None,
                severity: IntegritySeverity::Warning,
                details: format!("entity '{entity_id}' maps to nonexistent location '{location_id}'"),
            });
        }
    }

    let mut owners: HashMap<EntityId, Vec<LocationId>> = HashMap::new();
    for location in store.all_locations() {
        for entity_id in &location.entity_ids {
            owners.entry(entity_id.clone()).or_default().push(location.id.clone());
        }
    }
    for (entity_id, mut locations) in owners {
        if locations.len() > 1 {
            locations.sort();
            issues.push(IntegrityIssue {
                kind: IssueKind::DuplicateEntity,
                location_id: None,
                entity_id: Some(entity_id.clone()),
                module_id: None,
                severity: IntegritySeverity::Error,
                details: format!("entity '{entity_id}' appears in locations {locations:?}"),
            });
        }
    }

    for location in store.all_locations() {
        let empty = location.entity_ids.is_empty()
            && location.modules.is_empty()
            && store.children_of(&location.id).is_empty()
            && !location.is_root();
        if empty {
            issues.push(IntegrityIssue {
                kind: IssueKind::EmptyLocation,
                location_id: Some(location.id.clone()),
                entity_id: None,
                module_id: None,
                severity: IntegritySeverity::Info,
                details: format!("'{}' has no children, entities, or module config", location.id),
            });
        }
    }

    issues
}

/// Attempt to fix a single issue in place. Only `OrphanedEntity`,
/// `DuplicateEntity`, and `EmptyLocation` are auto-repairable; everything
/// else requires manual intervention.
pub fn auto_repair(store: &mut LocationStore, issue: &IntegrityIssue) -> RepairOutcome {
    match issue.kind {
        IssueKind::OrphanedEntity => {
            let Some(entity_id) = &issue.entity_id else { return RepairOutcome::NotRepaired };
            store.drop_orphaned_entity(entity_id);
            RepairOutcome::Repaired
        }
        IssueKind::DuplicateEntity => {
            let Some(entity_id) = &issue.entity_id else { return RepairOutcome::NotRepaired };
            let mut owners: Vec<LocationId> = store
                .all_locations()
                .into_iter()
                .filter(|l| l.entity_ids.contains(entity_id))
                .map(|l| l.id.clone())
                .collect();
            owners.sort();
            let Some(keep) = owners.into_iter().next() else { return RepairOutcome::NotRepaired };
            store.resolve_duplicate_entity(entity_id, &keep);
            RepairOutcome::Repaired
        }
        IssueKind::EmptyLocation => {
            let Some(location_id) = &issue.location_id else { return RepairOutcome::NotRepaired };
            match store.delete_location(location_id, false, false) {
                Ok(_) => RepairOutcome::Repaired,
                Err(err) => {
                    warn!(location = %location_id, error = %err, "auto_repair could not delete empty location");
                    RepairOutcome::NotRepaired
                }
            }
        }
        IssueKind::BrokenParent | IssueKind::Cycle => RepairOutcome::NotRepaired,
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
