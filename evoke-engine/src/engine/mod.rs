/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The evoke engine: scheduling and serialized execution of rule modules.
//!
//! [`EvokeEngine`] owns the message queue, the deferred submitter and the
//! consumer thread.  Producers talk to it through a cloneable
//! [`EngineHandle`]; the consumer loop lives in `scheduler.rs`.
//!
//! # Lifecycle
//! ```text
//! BaseExecutionContext::system()          (engine slot empty)
//!         │
//! EvokeEngine::new(context, modules)      → context.set_engine(handle)
//!         │
//! start()  ── spawns the consumer thread
//!         │   submit_event / submit_invocation from any thread
//! stop()   ── closes the queue, cancels timers, joins the consumer
//! ```
//!
//! An engine runs once: after `stop()` it cannot be restarted.
//!
//! # Guarantees
//!
//! | Topic | Behaviour |
//! |---|---|
//! | Execution | One consumer thread runs every module body and touches every trigger |
//! | Ordering | Higher queue priority first; events (`100 + urgency`) outrank invocations (`1..=99`) |
//! | Same-instant groups | Sorted by priority and inserted atomically |
//! | Faults | Trigger and body faults (errors or panics) are reported and absorbed |
//! | Timers | Best-effort: never early, possibly late |
//! | Shutdown | Queued and deferred messages are dropped; a running body finishes |
//!
//! # Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use chrono::Utc;
//! use evoke_engine::context::BaseExecutionContext;
//! use evoke_engine::engine::EvokeEngine;
//! use evoke_engine::event::Event;
//!
//! let context = Arc::new(BaseExecutionContext::system());
//! let mut engine = EvokeEngine::new(context, vec![]).unwrap();
//! engine.start().unwrap();
//! engine.submit_event(Event::new("admission", Utc::now()), Duration::ZERO, 50);
//! engine.stop();
//! ```

pub mod error;
mod handle;
mod scheduler;
mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{EngineError, FaultKind};
pub use handle::EngineHandle;
pub use stats::{EngineStats, StatsSnapshot};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use crate::config::EngineConfig;
use crate::deferred::DeferredSubmitter;
use crate::event::Event;
use crate::module::{ExecutionContext, Module, Runnable, Trigger, Value};
use crate::queue::MessageQueue;

use scheduler::Scheduler;

// ── EvokeEngine ───────────────────────────────────────────────────────────────

/// Owner of the scheduling machinery for a fixed set of modules.
pub struct EvokeEngine {
    handle: EngineHandle,
    context: Arc<dyn ExecutionContext>,
    modules: Arc<[Arc<dyn Module>]>,
    config: EngineConfig,
    consumer: Option<JoinHandle<()>>,
    started: bool,
}

impl EvokeEngine {
    /// Create an engine with default settings and register it with
    /// `context`.
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        modules: Vec<Arc<dyn Module>>,
    ) -> Result<Self, EngineError> {
        Self::with_config(context, modules, EngineConfig::default())
    }

    /// Create an engine and register its [`EngineHandle`] with `context`.
    ///
    /// # Errors
    /// [`EngineError::DeferredRuntime`] if the timer threads cannot be
    /// created.
    pub fn with_config(
        context: Arc<dyn ExecutionContext>,
        modules: Vec<Arc<dyn Module>>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let modules: Arc<[Arc<dyn Module>]> = modules.into();
        let queue = Arc::new(MessageQueue::new());
        let deferred = DeferredSubmitter::new(
            queue.clone(),
            config.deferred_workers,
            &config.deferred_thread_name,
        )
        .map_err(EngineError::DeferredRuntime)?;

        let handle = EngineHandle::new(
            queue,
            Arc::new(deferred),
            Arc::new(EngineStats::default()),
            modules.clone(),
        );
        context.set_engine(handle.clone());

        info!(
            modules = modules.len(),
            deferred_workers = config.deferred_workers,
            "evoke engine created"
        );

        Ok(Self {
            handle,
            context,
            modules,
            config,
            consumer: None,
            started: false,
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.handle.stats()
    }

    /// `true` while the spawned consumer thread is alive.
    pub fn is_running(&self) -> bool {
        self.consumer.as_ref().is_some_and(|h| !h.is_finished())
    }

    // ── Entry points ──────────────────────────────────────────────────────────

    /// See [`EngineHandle::submit_event`].
    pub fn submit_event(&self, event: Event, delay: Duration, urgency: u8) {
        self.handle.submit_event(event, delay, urgency);
    }

    /// See [`EngineHandle::submit_invocation`].
    pub fn submit_invocation(
        &self,
        runnable: Arc<dyn Runnable>,
        args: Option<Vec<Value>>,
        delay: Duration,
        trigger: Option<Arc<dyn Trigger>>,
        urgency: u8,
    ) {
        self.handle
            .submit_invocation(runnable, args, delay, trigger, urgency);
    }

    /// Modules with a trigger firing on `event`.  See
    /// [`EngineHandle::find_modules`].
    pub fn find_modules(&self, event: &Event) -> Vec<Arc<dyn Module>> {
        self.handle.find_modules(&*self.context, event)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    fn claim_start(&mut self) -> Result<(), EngineError> {
        if self.handle.is_stopped() {
            return Err(EngineError::Stopped);
        }
        if self.started {
            return Err(EngineError::AlreadyRunning);
        }
        self.started = true;
        Ok(())
    }

    fn scheduler(&self) -> Scheduler {
        Scheduler::new(&self.handle, self.context.clone(), self.modules.clone())
    }

    /// Spawn the dedicated consumer thread.
    ///
    /// # Errors
    /// * [`EngineError::AlreadyRunning`] if started before.
    /// * [`EngineError::Stopped`] after [`stop`](Self::stop).
    /// * [`EngineError::SpawnConsumer`] if the OS refuses the thread.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.claim_start()?;

        let scheduler = self.scheduler();
        let name = self.config.consumer_thread_name.clone();
        let consumer = thread::Builder::new()
            .name(name.clone())
            .spawn(move || scheduler.run())
            .map_err(|source| {
                self.started = false;
                EngineError::SpawnConsumer {
                    name: name.clone(),
                    source,
                }
            })?;

        info!(thread = %name, "evoke engine started");
        self.consumer = Some(consumer);
        Ok(())
    }

    /// Run the consumer loop on the calling thread until
    /// [`EngineHandle::stop`] is called from elsewhere (or from a module
    /// body).
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.claim_start()?;
        self.scheduler().run();
        Ok(())
    }

    /// Stop the engine: close the queue, cancel deferred submissions and
    /// wait for the consumer thread to finish its current message.
    /// Idempotent.
    pub fn stop(&mut self) {
        self.handle.stop();

        if let Some(consumer) = self.consumer.take() {
            if consumer.thread().id() == thread::current().id() {
                return;
            }
            if consumer.join().is_err() {
                error!("consumer thread terminated by a panic");
            }
            info!("evoke engine stopped");
        }
    }
}

impl Drop for EvokeEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
