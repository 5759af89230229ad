/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Reference [`Trigger`] implementations.
//!
//! | Trigger | Fires on event | Due time |
//! |---|---|---|
//! | [`EventTrigger`] | matching name | never |
//! | [`DelayedEventTrigger`] | never | `event.time + delay` per matching event |
//! | [`CyclicTrigger`] | never | `start + k·interval`, earliest not before now |
//! | [`FixedTimeTrigger`] | never | its instant, unless already past when first seen |
//!
//! Trigger state is only touched from the consumer thread; the mutexes make
//! the types `Sync`, they are never contended.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::trace;

use crate::event::Event;
use crate::module::{ExecutionContext, InvocationError, Trigger};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── EventTrigger ──────────────────────────────────────────────────────────────

/// Runs its module as soon as a named event is processed.
#[derive(Debug, Clone)]
pub struct EventTrigger {
    event: String,
}

impl EventTrigger {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
        }
    }
}

impl Trigger for EventTrigger {
    fn next_due_time(
        &self,
        _context: &dyn ExecutionContext,
    ) -> Result<Option<DateTime<Utc>>, InvocationError> {
        Ok(None)
    }

    fn fires_on(&self, event: &Event) -> bool {
        event.is(&self.event)
    }

    fn record_event(&self, _event: &Event) {}
}

// ── DelayedEventTrigger ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Occurrence {
    seq: u64,
    due: DateTime<Utc>,
    reported: bool,
}

#[derive(Debug, Default)]
struct Occurrences {
    queue: VecDeque<Occurrence>,
    next_seq: u64,
}

/// Runs its module a fixed delay after each occurrence of a named event.
///
/// The delay is measured from the event's own time, not from when the event
/// was processed.  Each recorded occurrence is reported until it has been
/// handed out and its instant has passed.
#[derive(Debug)]
pub struct DelayedEventTrigger {
    event: String,
    delay: ChronoDuration,
    occurrences: Mutex<Occurrences>,
}

impl DelayedEventTrigger {
    pub fn new(event: impl Into<String>, delay: ChronoDuration) -> Self {
        Self {
            event: event.into(),
            delay,
            occurrences: Mutex::new(Occurrences::default()),
        }
    }

    /// Occurrences recorded and not yet retired.
    pub fn pending(&self) -> usize {
        lock(&self.occurrences).queue.len()
    }
}

impl Trigger for DelayedEventTrigger {
    fn next_due_time(
        &self,
        context: &dyn ExecutionContext,
    ) -> Result<Option<DateTime<Utc>>, InvocationError> {
        let now = context.current_time();
        let mut occurrences = lock(&self.occurrences);
        let queue = &mut occurrences.queue;

        while queue.front().is_some_and(|o| o.reported && o.due <= now) {
            queue.pop_front();
        }

        Ok(queue.front_mut().map(|o| {
            o.reported = true;
            o.due
        }))
    }

    fn occurrence(&self) -> u64 {
        lock(&self.occurrences).queue.front().map_or(0, |o| o.seq)
    }

    fn fires_on(&self, _event: &Event) -> bool {
        false
    }

    fn record_event(&self, event: &Event) {
        if !event.is(&self.event) {
            return;
        }
        let due = event.time + self.delay;
        let mut occurrences = lock(&self.occurrences);
        occurrences.next_seq += 1;
        let seq = occurrences.next_seq;
        let at = occurrences.queue.partition_point(|o| o.due <= due);
        occurrences.queue.insert(
            at,
            Occurrence {
                seq,
                due,
                reported: false,
            },
        );
        trace!(event = %event.name, due = %due, "delayed occurrence recorded");
    }
}

// ── CyclicTrigger ─────────────────────────────────────────────────────────────

/// Runs its module every `interval`, phase-aligned to `start`.
///
/// Without an explicit start the cycle is anchored at the time the trigger
/// is first evaluated, so the module runs once right away.
#[derive(Debug)]
pub struct CyclicTrigger {
    interval: ChronoDuration,
    start: Mutex<Option<DateTime<Utc>>>,
}

impl CyclicTrigger {
    pub fn new(interval: ChronoDuration, start: Option<DateTime<Utc>>) -> Self {
        Self {
            interval,
            start: Mutex::new(start),
        }
    }

    pub fn interval(&self) -> ChronoDuration {
        self.interval
    }
}

impl Trigger for CyclicTrigger {
    fn next_due_time(
        &self,
        context: &dyn ExecutionContext,
    ) -> Result<Option<DateTime<Utc>>, InvocationError> {
        let interval = self
            .interval
            .num_nanoseconds()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                InvocationError::failed(format!("invalid cycle interval {}", self.interval))
            })?;

        let now = context.current_time();
        let start = *lock(&self.start).get_or_insert(now);
        if now <= start {
            return Ok(Some(start));
        }

        let elapsed = (now - start)
            .num_nanoseconds()
            .ok_or_else(|| InvocationError::failed("cycle start too far in the past"))?;
        let cycles = elapsed.div_euclid(interval) + i64::from(elapsed % interval != 0);
        Ok(Some(start + ChronoDuration::nanoseconds(cycles * interval)))
    }

    fn fires_on(&self, _event: &Event) -> bool {
        false
    }

    fn record_event(&self, _event: &Event) {}
}

// ── FixedTimeTrigger ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unseen,
    Armed,
    Done,
}

/// Runs its module once at a fixed instant.
///
/// An instant already in the past when the trigger is first evaluated is
/// never reported.
#[derive(Debug)]
pub struct FixedTimeTrigger {
    at: DateTime<Utc>,
    phase: Mutex<Phase>,
}

impl FixedTimeTrigger {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            phase: Mutex::new(Phase::Unseen),
        }
    }
}

impl Trigger for FixedTimeTrigger {
    fn next_due_time(
        &self,
        context: &dyn ExecutionContext,
    ) -> Result<Option<DateTime<Utc>>, InvocationError> {
        let now = context.current_time();
        let mut phase = lock(&self.phase);

        *phase = match *phase {
            Phase::Unseen if self.at < now => Phase::Done,
            Phase::Unseen => Phase::Armed,
            Phase::Armed if self.at < now => Phase::Done,
            other => other,
        };

        Ok((*phase == Phase::Armed).then_some(self.at))
    }

    fn fires_on(&self, _event: &Event) -> bool {
        false
    }

    fn record_event(&self, _event: &Event) {}
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BaseExecutionContext;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> ChronoDuration {
        ChronoDuration::seconds(n)
    }

    #[test]
    fn event_trigger_matches_name_only() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = EventTrigger::new("lab_result");

        assert!(trigger.fires_on(&Event::new("lab_result", t0())));
        assert!(!trigger.fires_on(&Event::new("admission", t0())));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);
    }

    #[test]
    fn delayed_trigger_is_due_after_event_time() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = DelayedEventTrigger::new("admission", secs(30));

        trigger.record_event(&Event::new("discharge", t0()));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);

        trigger.record_event(&Event::new("admission", t0() - secs(10)));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(20)));
        assert!(!trigger.fires_on(&Event::new("admission", t0())));
    }

    #[test]
    fn delayed_trigger_reports_occurrences_in_order_and_retires_them() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = DelayedEventTrigger::new("vitals", secs(60));
        trigger.record_event(&Event::new("vitals", t0() + secs(5)));
        trigger.record_event(&Event::new("vitals", t0()));

        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(60)));

        ctx.set_time(t0() + secs(60));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(65)));
        assert_eq!(trigger.pending(), 1);

        ctx.set_time(t0() + secs(70));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);
        assert_eq!(trigger.pending(), 0);
    }

    #[test]
    fn delayed_occurrence_already_due_is_reported_once() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = DelayedEventTrigger::new("vitals", secs(1));
        trigger.record_event(&Event::new("vitals", t0() - secs(10)));

        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() - secs(9)));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);
    }

    #[test]
    fn same_instant_occurrences_are_numbered_apart() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = DelayedEventTrigger::new("admission", secs(1));
        trigger.record_event(&Event::new("admission", t0() - secs(10)));
        trigger.record_event(&Event::new("admission", t0() - secs(10)));

        let first = trigger.next_due_time(&ctx).unwrap();
        let first_seq = trigger.occurrence();
        let second = trigger.next_due_time(&ctx).unwrap();
        let second_seq = trigger.occurrence();

        assert_eq!(first, second);
        assert_ne!(first_seq, second_seq);
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);
    }

    #[test]
    fn cyclic_trigger_aligns_to_start() {
        let ctx = BaseExecutionContext::manual(t0() + secs(25));
        let trigger = CyclicTrigger::new(secs(10), Some(t0()));

        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(30)));

        ctx.set_time(t0() + secs(30));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(30)));

        ctx.advance(ChronoDuration::milliseconds(1));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(40)));
    }

    #[test]
    fn cyclic_trigger_with_future_start_waits_for_it() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = CyclicTrigger::new(secs(10), Some(t0() + secs(90)));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(90)));
    }

    #[test]
    fn cyclic_trigger_without_start_anchors_at_first_evaluation() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = CyclicTrigger::new(secs(10), None);

        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0()));
        ctx.advance(secs(3));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(10)));
    }

    #[test]
    fn cyclic_trigger_rejects_non_positive_interval() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = CyclicTrigger::new(ChronoDuration::zero(), None);
        assert!(trigger.next_due_time(&ctx).is_err());
    }

    #[test]
    fn fixed_time_in_the_past_is_never_due() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = FixedTimeTrigger::new(t0() - secs(1));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);
    }

    #[test]
    fn fixed_time_is_due_until_it_passes() {
        let ctx = BaseExecutionContext::manual(t0());
        let trigger = FixedTimeTrigger::new(t0() + secs(5));

        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(5)));
        ctx.set_time(t0() + secs(5));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), Some(t0() + secs(5)));
        ctx.advance(secs(1));
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);
        ctx.set_time(t0());
        assert_eq!(trigger.next_due_time(&ctx).unwrap(), None);
    }
}
