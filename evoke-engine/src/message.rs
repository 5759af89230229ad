/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Units of work flowing through the engine's message queue.
//!
//! Two variants model the two kinds of stimuli:
//!
//! ```text
//! submit_event ──► EventCall ──(consumer: record + fires_on)──► InvocationCall*
//! schedule / submit_invocation ──────────────────────────────► InvocationCall ──► Runnable::run
//! ```
//!
//! # Priority bands
//! Invocation priorities live in `1..=99` (a module's declared priority, or a
//! caller-supplied urgency).  Event priorities are `100 + urgency`, i.e.
//! `101..=199`.  The bands are disjoint, so an event always outranks every
//! pending invocation and its fan-out is queued before lower-priority work
//! runs.  A message's priority is fixed at construction.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::event::Event;
use crate::module::{ExecutionContext, InvocationError, Module, Runnable, Trigger, Value};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Offset added to an event's urgency to form its queue priority.
pub const EVENT_PRIORITY_BASE: i32 = 100;

/// Convert a module's declared (fractional) priority into a queue priority.
pub fn module_priority(declared: f64) -> i32 {
    declared.round() as i32
}

// ── InvocationTarget ──────────────────────────────────────────────────────────

/// What an [`InvocationCall`] runs.
#[derive(Clone)]
pub enum InvocationTarget {
    /// A registered module, scheduled by one of its triggers.
    Module(Arc<dyn Module>),
    /// A callable handed in through `submit_invocation`.
    Runnable(Arc<dyn Runnable>),
}

impl InvocationTarget {
    pub fn name(&self) -> &str {
        match self {
            InvocationTarget::Module(m) => m.name(),
            InvocationTarget::Runnable(r) => r.name(),
        }
    }

    fn run(
        &self,
        context: &dyn ExecutionContext,
        args: Option<&[Value]>,
        trigger: Option<&Arc<dyn Trigger>>,
    ) -> Result<Vec<Value>, InvocationError> {
        match self {
            InvocationTarget::Module(m) => m.run(context, args, trigger),
            InvocationTarget::Runnable(r) => r.run(context, args, trigger),
        }
    }
}

// ── EventCall ─────────────────────────────────────────────────────────────────

/// An event waiting to be shown to every module's triggers.
#[derive(Debug, Clone)]
pub struct EventCall {
    pub event: Event,
    /// 1 (low) to 99 (high).  Not validated.
    pub urgency: u8,
}

impl EventCall {
    pub fn priority(&self) -> i32 {
        EVENT_PRIORITY_BASE + i32::from(self.urgency)
    }
}

// ── InvocationCall ────────────────────────────────────────────────────────────

/// A pending run of a module body or externally supplied runnable.
#[derive(Clone)]
pub struct InvocationCall {
    pub target: InvocationTarget,
    pub args: Option<Vec<Value>>,
    /// Trigger that caused the call; `None` for direct requests.
    pub trigger: Option<Arc<dyn Trigger>>,
    pub priority: i32,
    /// Due time and trigger occurrence this call was scheduled for; `None`
    /// for event fan-out and direct requests.
    pub(crate) scheduled_for: Option<(DateTime<Utc>, u64)>,
}

impl InvocationCall {
    /// A call caused by `trigger`, prioritised by the module's declared
    /// priority.
    pub fn for_module(module: Arc<dyn Module>, trigger: Arc<dyn Trigger>) -> Self {
        let priority = module_priority(module.priority());
        Self {
            target: InvocationTarget::Module(module),
            args: None,
            trigger: Some(trigger),
            priority,
            scheduled_for: None,
        }
    }

    /// A call requested through the engine, prioritised by `urgency`.
    pub fn requested(
        runnable: Arc<dyn Runnable>,
        args: Option<Vec<Value>>,
        trigger: Option<Arc<dyn Trigger>>,
        urgency: u8,
    ) -> Self {
        Self {
            target: InvocationTarget::Runnable(runnable),
            args,
            trigger,
            priority: i32::from(urgency),
            scheduled_for: None,
        }
    }

    /// Run the target with the call's arguments and trigger.
    pub fn invoke(&self, context: &dyn ExecutionContext) -> Result<Vec<Value>, InvocationError> {
        self.target
            .run(context, self.args.as_deref(), self.trigger.as_ref())
    }
}

impl std::fmt::Debug for InvocationCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationCall")
            .field("target", &self.target.name())
            .field("args", &self.args)
            .field("trigger", &self.trigger)
            .field("priority", &self.priority)
            .field("scheduled_for", &self.scheduled_for)
            .finish()
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// One entry of the engine's message queue.
#[derive(Debug, Clone)]
pub enum Message {
    Event(EventCall),
    Invocation(InvocationCall),
}

impl Message {
    /// Queue priority; higher is dequeued first.  Not necessarily the same as
    /// a module's declared priority.
    pub fn priority(&self) -> i32 {
        match self {
            Message::Event(call) => call.priority(),
            Message::Invocation(call) => call.priority,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Message::Event(_))
    }

    /// Short description for log lines: the event name or the target name.
    pub fn label(&self) -> &str {
        match self {
            Message::Event(call) => &call.event.name,
            Message::Invocation(call) => call.target.name(),
        }
    }
}

impl From<EventCall> for Message {
    fn from(call: EventCall) -> Self {
        Message::Event(call)
    }
}

impl From<InvocationCall> for Message {
    fn from(call: InvocationCall) -> Self {
        Message::Invocation(call)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
