/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The consumer loop.
//!
//! [`Scheduler`] is owned by exactly one thread for the engine's lifetime.
//! It is the only code that calls module bodies or touches trigger state:
//!
//! ```text
//! schedule_triggers()
//! loop {
//!     take()  ── blocks; None once the queue is closed
//!     execute(message)
//!       ├─ EventCall:      record_event + fires_on on every trigger → add(InvocationCall)
//!       └─ InvocationCall: Runnable::run, faults caught and reported
//!     schedule_triggers()  ── full recomputation, not incremental
//! }
//! shutdown_now()
//! ```
//!
//! # Schedule
//! Every pass asks every module's triggers for their next due time and
//! groups the resulting calls by instant (`BTreeMap`, earliest first).  Each
//! group is sorted by descending priority and inserted with one
//! `add_all`, immediately if already due, otherwise through the deferred
//! submitter.
//!
//! A `(module, trigger, due time, occurrence)` entry is dispatched at most
//! once: the loop remembers what it has handed out and forgets an entry as
//! soon as the trigger stops reporting it.  An entry is also forgotten when
//! its call runs while the clock is still before the due time (the wall
//! clock stepped back), so the next pass re-arms it.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, error, info, trace, warn};

use super::error::FaultKind;
use super::handle::EngineHandle;
use super::stats::EngineStats;
use crate::deferred::DeferredSubmitter;
use crate::message::{EventCall, InvocationCall, InvocationTarget, Message};
use crate::module::{ExecutionContext, InvocationError, Module, Trigger};
use crate::queue::MessageQueue;

// ── Schedule types ────────────────────────────────────────────────────────────

/// Identity of a trigger slot: module pointer + trigger pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotKey {
    module: usize,
    trigger: usize,
}

impl SlotKey {
    fn of(module: &Arc<dyn Module>, trigger: &Arc<dyn Trigger>) -> Self {
        Self {
            module: Arc::as_ptr(module) as *const () as usize,
            trigger: Arc::as_ptr(trigger) as *const () as usize,
        }
    }
}

/// What the loop remembers about a dispatched call.
type DispatchKey = (SlotKey, DateTime<Utc>, u64);

struct Scheduled {
    key: DispatchKey,
    call: InvocationCall,
}

/// Clock skew, in milliseconds, below which a call has not run early.
const EARLY_RUN_TOLERANCE_MS: i64 = 5;

/// Due instant → calls becoming due at that instant.
type Schedule = BTreeMap<DateTime<Utc>, Vec<Scheduled>>;

// ── Fault isolation ───────────────────────────────────────────────────────────

/// Run `f`, turning a panic into [`InvocationError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T, InvocationError>) -> Result<T, InvocationError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(InvocationError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

pub(crate) struct Scheduler {
    queue: Arc<MessageQueue>,
    deferred: Arc<DeferredSubmitter>,
    stats: Arc<EngineStats>,
    context: Arc<dyn ExecutionContext>,
    modules: Arc<[Arc<dyn Module>]>,
    dispatched: HashSet<DispatchKey>,
}

impl Scheduler {
    pub(crate) fn new(
        handle: &EngineHandle,
        context: Arc<dyn ExecutionContext>,
        modules: Arc<[Arc<dyn Module>]>,
    ) -> Self {
        Self {
            queue: handle.queue().clone(),
            deferred: handle.deferred().clone(),
            stats: handle.stats_handle().clone(),
            context,
            modules,
            dispatched: HashSet::new(),
        }
    }

    // ── Loop ──────────────────────────────────────────────────────────────────

    /// Drain the queue until it is closed, then cancel outstanding timers.
    pub(crate) fn run(mut self) {
        info!(modules = self.modules.len(), "=== evoke engine consumer loop started ===");

        self.schedule_triggers();

        while let Some(message) = self.queue.take() {
            self.execute(message);
            self.schedule_triggers();
        }

        let dropped = self.deferred.shutdown_now();
        self.stats.record_deferred_dropped(dropped);

        let stats = self.stats.snapshot();
        info!(
            events = stats.events,
            invocations = stats.invocations,
            invocation_faults = stats.invocation_faults,
            trigger_faults = stats.trigger_faults,
            "=== evoke engine consumer loop stopped ==="
        );
    }

    /// Execute one message synchronously on the calling thread.
    pub(crate) fn execute(&mut self, message: Message) {
        trace!(label = %message.label(), priority = message.priority(), "executing message");
        match message {
            Message::Event(call) => self.process_event(call),
            Message::Invocation(call) => self.invoke(call),
        }
    }

    // ── Event fan-out ─────────────────────────────────────────────────────────

    /// Show the event to every trigger and queue a call for each one that
    /// fires.  Calls are already due, so they go straight into the queue.
    fn process_event(&mut self, call: EventCall) {
        self.stats.record_event();
        let event = &call.event;
        let mut fired = 0usize;

        for module in self.modules.iter() {
            let context = &*self.context;
            let firing = guarded(|| {
                let triggers = module.triggers(context)?;
                let mut firing = Vec::new();
                for trigger in triggers {
                    trigger.record_event(event);
                    if trigger.fires_on(event) {
                        firing.push(trigger);
                    }
                }
                Ok(firing)
            });

            match firing {
                Ok(firing) => {
                    for trigger in firing {
                        self.queue
                            .add(InvocationCall::for_module(module.clone(), trigger));
                        fired += 1;
                    }
                }
                Err(e) => self.report(FaultKind::TriggerEvaluation, module.name(), &e),
            }
        }

        debug!(
            event = %event.name,
            urgency = call.urgency,
            fired,
            "event processed"
        );
    }

    // ── Invocation ────────────────────────────────────────────────────────────

    fn invoke(&mut self, call: InvocationCall) {
        let context = &*self.context;
        let outcome = guarded(|| call.invoke(context));
        self.rearm_if_early(&call);

        match outcome {
            Ok(results) => {
                self.stats.record_invocation();
                debug!(
                    target_name = %call.target.name(),
                    priority = call.priority,
                    scheduled = matches!(call.target, InvocationTarget::Module(_)),
                    results = results.len(),
                    "invocation complete"
                );
            }
            Err(e) => self.report(FaultKind::Invocation, call.target.name(), &e),
        }
    }

    /// Forget the dispatch entry of a scheduled call that ran before its due
    /// time, so the next pass schedules it again.
    fn rearm_if_early(&mut self, call: &InvocationCall) {
        let (Some((due, occurrence)), InvocationTarget::Module(module), Some(trigger)) =
            (call.scheduled_for, &call.target, &call.trigger)
        else {
            return;
        };
        let now = self.context.current_time();
        if now + ChronoDuration::milliseconds(EARLY_RUN_TOLERANCE_MS) < due
            && self
                .dispatched
                .remove(&(SlotKey::of(module, trigger), due, occurrence))
        {
            warn!(
                module = %module.name(),
                due = %due,
                now = %now,
                "call ran before its due time, re-arming"
            );
        }
    }

    fn report(&self, kind: FaultKind, name: &str, err: &InvocationError) {
        self.stats.record_fault(kind);
        match kind {
            FaultKind::TriggerEvaluation => warn!(
                module = %name,
                error = %err,
                "{kind}: module skipped for this pass"
            ),
            FaultKind::Invocation => error!(
                target_name = %name,
                error = %err,
                "{kind}: call discarded"
            ),
        }
    }

    // ── Schedule computation ──────────────────────────────────────────────────

    /// Group every module's next due calls by instant.
    ///
    /// A module whose triggers fail to evaluate contributes nothing to this
    /// schedule; the others are unaffected.
    fn create_schedule(&self) -> Schedule {
        let mut schedule = Schedule::new();
        let context = &*self.context;

        for module in self.modules.iter() {
            let due = guarded(|| {
                let mut due = Vec::new();
                for trigger in module.triggers(context)? {
                    if let Some(at) = trigger.next_due_time(context)? {
                        due.push((at, trigger.occurrence(), trigger));
                    }
                }
                Ok(due)
            });

            match due {
                Ok(due) => {
                    for (at, occurrence, trigger) in due {
                        let key = (SlotKey::of(module, &trigger), at, occurrence);
                        let mut call = InvocationCall::for_module(module.clone(), trigger);
                        call.scheduled_for = Some((at, occurrence));
                        schedule.entry(at).or_default().push(Scheduled { key, call });
                    }
                }
                Err(e) => self.report(FaultKind::TriggerEvaluation, module.name(), &e),
            }
        }

        schedule
    }

    /// Recompute the schedule and dispatch every group not yet handed out.
    pub(crate) fn schedule_triggers(&mut self) {
        let schedule = self.create_schedule();
        let now = self.context.current_time();

        // Forget entries the triggers no longer report.
        let reported: HashSet<DispatchKey> = schedule
            .values()
            .flat_map(|group| group.iter().map(|s| s.key))
            .collect();
        self.dispatched.retain(|entry| reported.contains(entry));

        for (due, group) in schedule {
            let mut calls: Vec<InvocationCall> = group
                .into_iter()
                .filter(|s| self.dispatched.insert(s.key))
                .map(|s| s.call)
                .collect();
            if calls.is_empty() {
                continue;
            }

            // Highest priority first within the group.
            calls.sort_by(|a, b| b.priority.cmp(&a.priority));
            let batch: Vec<Message> = calls.into_iter().map(Message::from).collect();

            // A negative delay fails the conversion: already due.
            let delay = (due - now).to_std().unwrap_or(Duration::ZERO);
            if delay.is_zero() {
                debug!(due = %due, group = batch.len(), "group due now");
                self.queue.add_all(batch);
            } else {
                debug!(
                    due = %due,
                    group = batch.len(),
                    delay_ms = delay.as_millis() as u64,
                    "group deferred"
                );
                self.deferred.schedule(delay, batch);
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
