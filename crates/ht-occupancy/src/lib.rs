// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ht-occupancy: per-location occupancy state machine, upward propagation,
//! and stale-aware persistence (spec §3.4, §3.5, §4.3, §4.4).

pub mod config;
pub mod engine;
pub mod module;
pub mod ops;
pub mod persistence;
pub mod state;

pub use config::{OccupancyConfig, OccupancyStrategy, CURRENT_CONFIG_VERSION};
pub use module::OccupancyModule;
pub use ops::{OccupancyOp, PayloadError};
pub use persistence::{PersistedState, RestoreOutcome};
pub use state::OccupancyState;
