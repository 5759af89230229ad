/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Contracts between the engine and its collaborators.
//!
//! The engine schedules and invokes rule modules but does not know how they
//! are compiled, how they query data or what values they compute.  Those
//! concerns sit behind four traits:
//!
//! ```text
//! ExecutionContext ── current time, engine back-reference
//!        │
//! Module ──(priority, triggers)──► Trigger ── next_due_time / fires_on / record_event
//!   └── Runnable ── run(context, args, firing trigger)
//! ```
//!
//! # Threading
//! Every method here is invoked on the engine's consumer thread only.  The
//! `Send + Sync` bounds exist because messages holding these objects are
//! created on producer threads and moved through the queue; they do not
//! imply concurrent calls.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::engine::EngineHandle;
use crate::event::Event;

/// Opaque argument / result value exchanged with module bodies.
pub type Value = serde_json::Value;

// ── Faults ────────────────────────────────────────────────────────────────────

/// A fault raised by a module body or by trigger evaluation.
///
/// The engine never propagates these: it reports them through `tracing` and
/// carries on with the next module or message.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The module reported a failure of its own.
    #[error("{0}")]
    Failed(String),

    /// Reading or writing domain data failed.
    #[error("data access failed: {0}")]
    DataAccess(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The body or trigger panicked; the payload message is preserved.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl InvocationError {
    pub fn failed(message: impl Into<String>) -> Self {
        InvocationError::Failed(message.into())
    }
}

// ── Runnable ──────────────────────────────────────────────────────────────────

/// Anything the engine can invoke: a module body or an externally supplied
/// callable.
pub trait Runnable: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Run to completion on the consumer thread.
    ///
    /// `args` is `None` for scheduled and event-triggered invocations.
    /// `trigger` is the trigger that caused the call, or `None` for calls
    /// requested directly through the engine.
    fn run(
        &self,
        context: &dyn ExecutionContext,
        args: Option<&[Value]>,
        trigger: Option<&Arc<dyn Trigger>>,
    ) -> Result<Vec<Value>, InvocationError>;
}

// ── Module ────────────────────────────────────────────────────────────────────

/// A registered rule unit with a declared priority and one or more triggers.
pub trait Module: Runnable {
    /// Clinical importance on a 1–99 scale; higher runs first.
    fn priority(&self) -> f64;

    /// The module's triggers.
    ///
    /// Must return the same trigger objects on every call: the engine keys
    /// its dispatch bookkeeping on trigger identity.  May fail when
    /// evaluating the triggers needs the module's data slot.
    fn triggers(
        &self,
        context: &dyn ExecutionContext,
    ) -> Result<Vec<Arc<dyn Trigger>>, InvocationError>;
}

// ── Trigger ───────────────────────────────────────────────────────────────────

/// Per-module stateful object deciding when and whether its module runs.
pub trait Trigger: Send + Sync + std::fmt::Debug {
    /// When the module should next run on behalf of this trigger, or `None`
    /// if nothing is scheduled.
    fn next_due_time(
        &self,
        context: &dyn ExecutionContext,
    ) -> Result<Option<DateTime<Utc>>, InvocationError>;

    /// Identity of the item behind the last due time returned by
    /// [`next_due_time`](Self::next_due_time).
    ///
    /// The engine dispatches each `(due time, occurrence)` pair once, so a
    /// trigger holding several items due at the same instant must number
    /// them differently.  Triggers with one item per instant keep the
    /// default.
    fn occurrence(&self) -> u64 {
        0
    }

    /// Whether `event` makes the module run immediately.
    fn fires_on(&self, event: &Event) -> bool;

    /// Observe an event.  Called for every processed event before
    /// [`fires_on`](Self::fires_on), so time-shifted triggers can remember it.
    fn record_event(&self, event: &Event);
}

// ── ExecutionContext ──────────────────────────────────────────────────────────

/// Environment shared by the engine, module bodies and triggers.
pub trait ExecutionContext: Send + Sync {
    /// The engine's notion of "now".
    fn current_time(&self) -> DateTime<Utc>;

    /// Hand the engine's submission handle to the context.  Called exactly
    /// once, by [`EvokeEngine::new`](crate::engine::EvokeEngine::new).
    fn set_engine(&self, engine: EngineHandle);

    /// The registered engine handle, once [`set_engine`](Self::set_engine)
    /// has run.
    fn engine(&self) -> Option<&EngineHandle>;
}
