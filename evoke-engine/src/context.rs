/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! A ready-made [`ExecutionContext`].
//!
//! The engine and its context reference each other: module bodies reach the
//! engine through the context, and the engine reads the time from the
//! context.  The cycle is broken by two-phase construction:
//!
//! 1. build the context (engine slot empty);
//! 2. build the engine from it, which calls
//!    [`ExecutionContext::set_engine`] with a cloneable [`EngineHandle`].
//!
//! The slot is a `OnceLock`: assigned once, read lock-free afterwards.

use std::sync::{Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::warn;

use crate::engine::EngineHandle;
use crate::module::ExecutionContext;

/// Source of "now" for a [`BaseExecutionContext`].
#[derive(Debug)]
pub enum Clock {
    /// Wall-clock time.
    System,
    /// Time set explicitly by the host; used for replays and tests.
    Manual(Mutex<DateTime<Utc>>),
}

/// Execution context with a configurable clock and an engine slot.
#[derive(Debug)]
pub struct BaseExecutionContext {
    clock: Clock,
    engine: OnceLock<EngineHandle>,
}

impl BaseExecutionContext {
    /// Context following the system clock.
    pub fn system() -> Self {
        Self {
            clock: Clock::System,
            engine: OnceLock::new(),
        }
    }

    /// Context whose time only moves through [`set_time`](Self::set_time) /
    /// [`advance`](Self::advance).
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self {
            clock: Clock::Manual(Mutex::new(start)),
            engine: OnceLock::new(),
        }
    }

    /// Set the manual clock.  Ignored (with a warning) on a system clock.
    pub fn set_time(&self, time: DateTime<Utc>) {
        match &self.clock {
            Clock::System => warn!("set_time called on a system-clock context, ignored"),
            Clock::Manual(now) => {
                *now.lock().unwrap_or_else(PoisonError::into_inner) = time;
            }
        }
    }

    /// Move the manual clock forward by `by`.
    pub fn advance(&self, by: ChronoDuration) {
        let next = self.current_time() + by;
        self.set_time(next);
    }
}

impl ExecutionContext for BaseExecutionContext {
    fn current_time(&self) -> DateTime<Utc> {
        match &self.clock {
            Clock::System => Utc::now(),
            Clock::Manual(now) => *now.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn set_engine(&self, engine: EngineHandle) {
        if self.engine.set(engine).is_err() {
            warn!("execution context already bound to an engine, keeping the first one");
        }
    }

    fn engine(&self) -> Option<&EngineHandle> {
        self.engine.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 7, 0, 0).unwrap();
        let ctx = BaseExecutionContext::manual(start);
        assert_eq!(ctx.current_time(), start);

        ctx.advance(ChronoDuration::minutes(30));
        assert_eq!(ctx.current_time(), start + ChronoDuration::minutes(30));

        let later = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        ctx.set_time(later);
        assert_eq!(ctx.current_time(), later);
    }

    #[test]
    fn system_clock_ignores_set_time() {
        let ctx = BaseExecutionContext::system();
        let past = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        ctx.set_time(past);
        assert!(ctx.current_time() > past);
    }

    #[test]
    fn engine_slot_starts_empty() {
        let ctx = BaseExecutionContext::system();
        assert!(ctx.engine().is_none());
    }
}
