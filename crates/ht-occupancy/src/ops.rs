// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seven occupancy operations as a closed sum type (spec §4.3, §9
//! "Tagged variants instead of event-kind enums + strings"), plus the
//! `sensor.state_changed` payload parser (spec §6.1).

use thiserror::Error;

/// One of the seven operations the engine understands.
///
/// Timeouts are raw seconds rather than [`std::time::Duration`]: a negative
/// value is a reachable `ValidationError` (spec §4.3 edge cases), and
/// `Duration` cannot represent one. `None`/`Some(0)` both mean "use the
/// location's configured default"; `Some(n)` with `n > 0` is explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum OccupancyOp {
    Trigger { source_id: String, timeout_secs: Option<i64> },
    Hold { source_id: String },
    Release { source_id: String, trailing_timeout_secs: Option<i64> },
    Vacate,
    Lock { source_id: String },
    Unlock { source_id: String },
    UnlockAll,
}

impl OccupancyOp {
    /// The short `reason` string this op produces in `occupancy.changed`
    /// payloads (spec §4.4), excluding the engine-only `"tick"` and
    /// `"propagated:<child_id>"` reasons which have no corresponding op.
    pub fn reason(&self) -> String {
        match self {
            Self::Trigger { source_id, .. } => format!("trigger:{source_id}"),
            Self::Hold { source_id } => format!("hold:{source_id}"),
            Self::Release { source_id, .. } => format!("release:{source_id}"),
            Self::Vacate => "vacate".to_string(),
            Self::Lock { source_id } => format!("lock:{source_id}"),
            Self::Unlock { source_id } => format!("unlock:{source_id}"),
            Self::UnlockAll => "unlock_all".to_string(),
        }
    }

    /// Parse a `sensor.state_changed` event payload (spec §6.1).
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let op = payload
            .get("op")
            .and_then(serde_json::Value::as_str)
            .ok_or(PayloadError::MissingField("op"))?;

        let source_id = |payload: &serde_json::Value| -> Result<String, PayloadError> {
            payload
                .get("source_id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .ok_or(PayloadError::MissingField("source_id"))
        };
        let timeout = |payload: &serde_json::Value, field: &'static str| -> Result<Option<i64>, PayloadError> {
            match payload.get(field) {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(value) => value.as_i64().map(Some).ok_or(PayloadError::InvalidTimeout(field)),
            }
        };

        match op {
            "TRIGGER" => Ok(Self::Trigger {
                source_id: source_id(payload)?,
                timeout_secs: timeout(payload, "timeout")?,
            }),
            "HOLD" => Ok(Self::Hold { source_id: source_id(payload)? }),
            "RELEASE" => Ok(Self::Release {
                source_id: source_id(payload)?,
                trailing_timeout_secs: timeout(payload, "trailing_timeout")?,
            }),
            "VACATE" => Ok(Self::Vacate),
            "LOCK" => Ok(Self::Lock { source_id: source_id(payload)? }),
            "UNLOCK" => Ok(Self::Unlock { source_id: source_id(payload)? }),
            "UNLOCK_ALL" => Ok(Self::UnlockAll),
            other => Err(PayloadError::UnknownOp(other.to_string())),
        }
    }
}

/// A malformed `sensor.state_changed` payload.
///
/// Distinct from `ht_core::ValidationError`: this is a bus-handler-level
/// parsing concern, raised before the engine is ever invoked, not a
/// precondition violated at a direct-API call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload missing required field '{0}'")]
    MissingField(&'static str),

    #[error("unknown occupancy op '{0}'")]
    UnknownOp(String),

    #[error("field '{0}' must be an integer number of seconds")]
    InvalidTimeout(&'static str),
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
