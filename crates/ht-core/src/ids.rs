// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque id types for the topology core.
//!
//! All three are caller-assigned: the store never generates them. They
//! exist only to keep the location, entity, and module namespaces from
//! being confused with one another at the type level.

crate::define_opaque_id! {
    /// Primary key of a [`crate::Location`]. Globally unique, assigned by
    /// the caller, never mutated.
    pub struct LocationId;
}

crate::define_opaque_id! {
    /// Opaque external entity identifier (platform-specific), attached to
    /// at most one location at a time.
    pub struct EntityId;
}

crate::define_opaque_id! {
    /// Identifier of a behavior module (e.g. `"occupancy"`), used as the key
    /// into a [`crate::Location`]'s per-module config map.
    pub struct ModuleId;
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
