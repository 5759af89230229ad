/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cloneable entry points into a running engine.
//!
//! An [`EngineHandle`] may be used from any thread, including from module
//! bodies on the consumer thread (re-entrant submission).  Submissions never
//! block beyond the queue lock or the timer registration.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::stats::{EngineStats, StatsSnapshot};
use crate::deferred::DeferredSubmitter;
use crate::event::Event;
use crate::message::{EventCall, InvocationCall, Message};
use crate::module::{ExecutionContext, Module, Runnable, Trigger, Value};
use crate::queue::MessageQueue;

/// Submission handle shared by the engine, its context and any producer.
#[derive(Clone)]
pub struct EngineHandle {
    queue: Arc<MessageQueue>,
    deferred: Arc<DeferredSubmitter>,
    stats: Arc<EngineStats>,
    modules: Arc<[Arc<dyn Module>]>,
}

impl EngineHandle {
    pub(crate) fn new(
        queue: Arc<MessageQueue>,
        deferred: Arc<DeferredSubmitter>,
        stats: Arc<EngineStats>,
        modules: Arc<[Arc<dyn Module>]>,
    ) -> Self {
        Self {
            queue,
            deferred,
            stats,
            modules,
        }
    }

    // ── Submission ────────────────────────────────────────────────────────────

    /// Have every module's triggers look at `event`, after `delay`.
    ///
    /// The event is delivered "as is": its time is not shifted by the delay.
    /// `urgency` (1 low – 99 high) orders events among themselves; every
    /// event outranks every pending invocation.  Inputs are not validated.
    pub fn submit_event(&self, event: Event, delay: Duration, urgency: u8) {
        debug!(
            event = %event.name,
            delay_ms = delay.as_millis() as u64,
            urgency,
            "event submitted"
        );
        self.submit(EventCall { event, urgency }.into(), delay);
    }

    /// Run `runnable` after `delay` with queue priority `urgency`.
    ///
    /// `trigger` is handed to the runnable unchanged; pass `None` for a
    /// plain call.
    pub fn submit_invocation(
        &self,
        runnable: Arc<dyn Runnable>,
        args: Option<Vec<Value>>,
        delay: Duration,
        trigger: Option<Arc<dyn Trigger>>,
        urgency: u8,
    ) {
        debug!(
            runnable = %runnable.name(),
            delay_ms = delay.as_millis() as u64,
            urgency,
            "invocation submitted"
        );
        self.submit(
            InvocationCall::requested(runnable, args, trigger, urgency).into(),
            delay,
        );
    }

    fn submit(&self, message: Message, delay: Duration) {
        if delay.is_zero() {
            self.queue.add(message);
        } else {
            self.deferred.schedule(delay, vec![message]);
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Modules with at least one trigger that fires on `event`.
    ///
    /// Does not record the event.  Modules whose triggers cannot be listed
    /// are skipped with a warning.  Meant for module bodies, which run on
    /// the consumer thread.
    pub fn find_modules(
        &self,
        context: &dyn ExecutionContext,
        event: &Event,
    ) -> Vec<Arc<dyn Module>> {
        let mut found = Vec::new();
        for module in self.modules.iter() {
            match module.triggers(context) {
                Ok(triggers) => {
                    if triggers.iter().any(|t| t.fires_on(event)) {
                        found.push(module.clone());
                    }
                }
                Err(e) => {
                    warn!(module = %module.name(), error = %e, "cannot list triggers, module skipped");
                }
            }
        }
        found
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of messages currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of deferred batches waiting for their delay.
    pub fn pending_deferred(&self) -> usize {
        self.deferred.pending()
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    /// Request shutdown.  Safe from any thread, including a module body.
    ///
    /// Closes the queue (nothing submitted afterwards is executed, and queued
    /// messages are dropped) and cancels every pending deferred submission.
    /// A module body already running is allowed to finish.  Idempotent.
    pub fn stop(&self) {
        if self.queue.is_closed() {
            return;
        }
        let dropped = self.deferred.shutdown_now();
        let discarded = self.queue.close();
        self.stats.record_deferred_dropped(dropped);
        info!(
            discarded_messages = discarded,
            dropped_deferred = dropped,
            "engine stop requested"
        );
    }

    pub fn is_stopped(&self) -> bool {
        self.queue.is_closed()
    }

    pub(crate) fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub(crate) fn deferred(&self) -> &Arc<DeferredSubmitter> {
        &self.deferred
    }

    pub(crate) fn stats_handle(&self) -> &Arc<EngineStats> {
        &self.stats
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("modules", &self.modules.len())
            .field("queued", &self.queue.len())
            .field("stopped", &self.queue.is_closed())
            .finish()
    }
}
