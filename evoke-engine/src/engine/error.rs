/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the evoke engine.
//!
//! Two types model the two failure layers:
//!
//! * [`FaultKind`] — which kind of module fault the consumer loop absorbed.
//!   Faults are never returned to a caller; they are reported through
//!   `tracing` and counted in [`EngineStats`](super::EngineStats).
//! * [`EngineError`] — lifecycle failures returned from
//!   [`EvokeEngine`](super::EvokeEngine) construction and start-up.
//!
//! There is no fatal runtime error: once the consumer loop is running only
//! [`stop`](super::EvokeEngine::stop) ends it.

use thiserror::Error;

// ── Absorbed faults ───────────────────────────────────────────────────────────

/// Category of a fault absorbed by the consumer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Listing a module's triggers or computing a due time failed.  The
    /// module is skipped for the current scheduling pass (or for the event
    /// being processed) and reconsidered on the next one.
    TriggerEvaluation,

    /// A module body or requested runnable failed.  The call is discarded:
    /// no retry, no requeue.
    Invocation,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::TriggerEvaluation => write!(f, "trigger evaluation fault"),
            FaultKind::Invocation => write!(f, "invocation fault"),
        }
    }
}

// ── Lifecycle errors ──────────────────────────────────────────────────────────

/// Error returned by engine construction and lifecycle calls.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `start()` or `run()` was called while the consumer loop is active.
    #[error("engine is already running")]
    AlreadyRunning,

    /// The engine was stopped; its queue is closed for good.
    #[error("engine has been stopped and cannot be restarted")]
    Stopped,

    /// The timer runtime backing deferred submissions could not be built.
    #[error("failed to build the deferred submission runtime")]
    DeferredRuntime(#[source] std::io::Error),

    /// The dedicated consumer thread could not be spawned.
    #[error("failed to spawn consumer thread '{name}'")]
    SpawnConsumer {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
