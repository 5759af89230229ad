/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Domain events delivered to triggers.
//!
//! An [`Event`] is an external clinical occurrence (a lab result arriving, a
//! patient being admitted, ...).  The engine never inspects it beyond handing
//! it to every trigger: triggers decide by name whether they care.

use chrono::{DateTime, Utc};

/// An external domain occurrence that may cause one or more triggers to fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name as referenced by triggers (e.g. `"lab_result"`).
    pub name: String,

    /// When the event happened.  Delivered to triggers "as is": a delayed
    /// submission does not shift it.
    pub time: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            time,
        }
    }

    /// Returns `true` if this event carries `name`.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.time.to_rfc3339())
    }
}
