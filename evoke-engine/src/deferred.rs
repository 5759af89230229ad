/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Deferred submission: push prepared messages into the queue after a delay.
//!
//! Timers run on a small private tokio runtime (one worker by default), never
//! on the consumer thread.  A fired timer only inserts into the
//! [`MessageQueue`]; it never runs module code, so the single-consumer
//! execution discipline is preserved.
//!
//! Delays are lower bounds: a batch becomes visible no earlier than `delay`
//! after [`schedule`](DeferredSubmitter::schedule), possibly later.
//!
//! [`shutdown_now`](DeferredSubmitter::shutdown_now) cancels every pending
//! timer; cancelled batches are dropped, not flushed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::message::Message;
use crate::queue::MessageQueue;

/// Bookkeeping shared with the timer tasks.
///
/// A fired timer inserts its batch only while holding this lock and only if
/// shutdown has not begun, so every batch is either delivered or counted as
/// dropped, never both.
#[derive(Debug, Default)]
struct TimerState {
    pending: usize,
    cancelled: bool,
}

fn lock(state: &Mutex<TimerState>) -> MutexGuard<'_, TimerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Timer facility feeding the engine's [`MessageQueue`].
pub struct DeferredSubmitter {
    queue: Arc<MessageQueue>,
    runtime: Mutex<Option<Runtime>>,
    token: CancellationToken,
    state: Arc<Mutex<TimerState>>,
}

impl DeferredSubmitter {
    /// Build the timer runtime with `workers` threads named `thread_name`.
    ///
    /// # Errors
    /// Returns the I/O error raised if the runtime's threads cannot be
    /// created.
    pub fn new(
        queue: Arc<MessageQueue>,
        workers: usize,
        thread_name: &str,
    ) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name(thread_name)
            .enable_time()
            .build()?;

        debug!(workers = workers.max(1), thread_name, "deferred submitter ready");

        Ok(Self {
            queue,
            runtime: Mutex::new(Some(runtime)),
            token: CancellationToken::new(),
            state: Arc::new(Mutex::new(TimerState::default())),
        })
    }

    /// Insert `batch` into the queue once `delay` has elapsed.
    ///
    /// The batch is inserted with a single
    /// [`add_all`](MessageQueue::add_all).  Returns `false` (dropping the
    /// batch) if the submitter has been shut down.
    pub fn schedule(&self, delay: Duration, batch: Vec<Message>) -> bool {
        let guard = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(runtime) = guard.as_ref() else {
            debug!(batch_len = batch.len(), "deferred submitter shut down, batch dropped");
            return false;
        };

        let queue = self.queue.clone();
        let token = self.token.clone();
        let state = self.state.clone();
        lock(&state).pending += 1;

        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let mut state = lock(&state);
                    if !state.cancelled {
                        state.pending -= 1;
                        queue.add_all(batch);
                    }
                }
            }
        });

        true
    }

    /// Number of scheduled batches that have not fired yet.
    pub fn pending(&self) -> usize {
        lock(&self.state).pending
    }

    pub fn is_shut_down(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Cancel all pending timers and stop the timer threads without waiting
    /// for them.  Idempotent.  Returns the number of batches that were
    /// scheduled and never delivered to the queue.
    pub fn shutdown_now(&self) -> usize {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(runtime) = runtime else {
            return 0;
        };

        let dropped = {
            let mut state = lock(&self.state);
            state.cancelled = true;
            std::mem::take(&mut state.pending)
        };
        self.token.cancel();
        runtime.shutdown_background();

        info!(dropped, "deferred submitter shut down");
        dropped
    }
}

impl Drop for DeferredSubmitter {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
