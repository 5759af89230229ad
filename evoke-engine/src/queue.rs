/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Blocking priority queue between producers and the consumer loop.
//!
//! Any thread may [`add`](MessageQueue::add) or
//! [`add_all`](MessageQueue::add_all); exactly one consumer calls
//! [`take`](MessageQueue::take), which blocks until a message is available
//! and returns the highest-priority one.
//!
//! # Ordering
//! * Higher [`Message::priority`] first.
//! * Equal priorities leave in insertion order.  Callers must not rely on
//!   this: it is an artefact of the heap key, not part of the contract.
//! * `add_all` inserts the whole batch under one lock, so a consumer blocked
//!   in `take` can never observe half a batch.  A group of modules due at the
//!   same instant therefore competes on priority as a unit.
//!
//! # Shutdown
//! [`close`](MessageQueue::close) wakes the consumer, makes every later
//! `take` return `None` and turns later insertions into no-ops.  Messages
//! still queued at close time are dropped, not drained.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::message::Message;

// ── Heap entry ────────────────────────────────────────────────────────────────

struct Queued {
    priority: i32,
    seq: u64,
    message: Message,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins, then the older entry.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<Queued>,
    next_seq: u64,
    closed: bool,
}

impl QueueState {
    fn push(&mut self, message: Message) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued {
            priority: message.priority(),
            seq,
            message,
        });
    }
}

// ── MessageQueue ──────────────────────────────────────────────────────────────

/// Unbounded, thread-safe priority queue of [`Message`]s.
#[derive(Default)]
pub struct MessageQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // A panic while holding the lock cannot leave the heap half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert one message.  Returns `false` (and drops it) if the queue is
    /// closed.
    pub fn add(&self, message: impl Into<Message>) -> bool {
        let message = message.into();
        let mut state = self.lock();
        if state.closed {
            debug!(label = %message.label(), "queue closed, message dropped");
            return false;
        }
        state.push(message);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Insert a batch atomically with respect to [`take`](Self::take).
    /// Returns the number of messages inserted (`0` if closed).
    pub fn add_all<I>(&self, messages: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Message>,
    {
        let mut state = self.lock();
        if state.closed {
            debug!("queue closed, batch dropped");
            return 0;
        }
        let before = state.heap.len();
        for message in messages {
            state.push(message.into());
        }
        let added = state.heap.len() - before;
        drop(state);
        if added > 0 {
            self.available.notify_one();
        }
        added
    }

    /// Block until a message is available and return the highest-priority
    /// one, or `None` once the queue is closed.
    pub fn take(&self) -> Option<Message> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(entry) = state.heap.pop() {
                return Some(entry.message);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`take`](Self::take) but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Option<Message> {
        let state = self.lock();
        let (mut state, _) = self
            .available
            .wait_timeout_while(state, timeout, |s| !s.closed && s.heap.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return None;
        }
        state.heap.pop().map(|entry| entry.message)
    }

    /// Pop the highest-priority message without blocking.
    pub fn try_take(&self) -> Option<Message> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.heap.pop().map(|entry| entry.message)
    }

    /// Close the queue, discarding anything still queued, and wake the
    /// consumer.  Returns the number of discarded messages.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let discarded = state.heap.len();
        state.heap.clear();
        drop(state);
        self.available.notify_all();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().heap.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
