/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Counters describing what the consumer loop has done so far.

use std::sync::atomic::{AtomicU64, Ordering};

use super::error::FaultKind;

/// Live counters, shared between the consumer loop and every handle.
#[derive(Debug, Default)]
pub struct EngineStats {
    events: AtomicU64,
    invocations: AtomicU64,
    invocation_faults: AtomicU64,
    trigger_faults: AtomicU64,
    deferred_dropped: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Event messages processed.
    pub events: u64,
    /// Invocations that ran to completion without a fault.
    pub invocations: u64,
    /// Invocations discarded because the body failed or panicked.
    pub invocation_faults: u64,
    /// Modules skipped because their triggers could not be evaluated.
    pub trigger_faults: u64,
    /// Deferred batches cancelled by shutdown.
    pub deferred_dropped: u64,
}

impl EngineStats {
    pub(crate) fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self, kind: FaultKind) {
        let counter = match kind {
            FaultKind::TriggerEvaluation => &self.trigger_faults,
            FaultKind::Invocation => &self.invocation_faults,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred_dropped(&self, n: usize) {
        self.deferred_dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            invocation_faults: self.invocation_faults.load(Ordering::Relaxed),
            trigger_faults: self.trigger_faults.load(Ordering::Relaxed),
            deferred_dropped: self.deferred_dropped.load(Ordering::Relaxed),
        }
    }
}
