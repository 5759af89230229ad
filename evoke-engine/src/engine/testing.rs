/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Test doubles shared by the engine's unit tests.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::handle::EngineHandle;
use super::scheduler::Scheduler;
use super::stats::EngineStats;
use crate::context::BaseExecutionContext;
use crate::deferred::DeferredSubmitter;
use crate::event::Event;
use crate::module::{ExecutionContext, InvocationError, Module, Runnable, Trigger, Value};
use crate::queue::MessageQueue;

/// Manual-clock context frozen at `t`.
pub(crate) fn context_at(t: DateTime<Utc>) -> Arc<BaseExecutionContext> {
    Arc::new(BaseExecutionContext::manual(t))
}

/// Engine parts wired like `EvokeEngine::new`, with the scheduler handed to
/// the test instead of a consumer thread.
pub(crate) fn engine_with(
    ctx: Arc<BaseExecutionContext>,
    modules: Vec<Arc<dyn Module>>,
) -> (Arc<BaseExecutionContext>, EngineHandle, Scheduler) {
    let modules: Arc<[Arc<dyn Module>]> = modules.into();
    let queue = Arc::new(MessageQueue::new());
    let deferred = DeferredSubmitter::new(queue.clone(), 1, "evoke-test-deferred")
        .expect("test timer runtime");
    let handle = EngineHandle::new(
        queue,
        Arc::new(deferred),
        Arc::new(EngineStats::default()),
        modules.clone(),
    );
    ctx.set_engine(handle.clone());
    let scheduler = Scheduler::new(&handle, ctx.clone(), modules);
    (ctx, handle, scheduler)
}

// ── Recorder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct CallRecord {
    pub name: String,
    pub args: Option<Vec<Value>>,
    pub had_trigger: bool,
    pub time: DateTime<Utc>,
    pub thread: Option<String>,
    pub at: Instant,
}

/// Collects every call made to the runnables and modules built from it.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    inner: Arc<(Mutex<Vec<CallRecord>>, Condvar)>,
}

impl Recorder {
    fn record(
        &self,
        name: &str,
        context: &dyn ExecutionContext,
        args: Option<&[Value]>,
        trigger: Option<&Arc<dyn Trigger>>,
    ) {
        let (calls, cv) = &*self.inner;
        calls.lock().unwrap().push(CallRecord {
            name: name.to_string(),
            args: args.map(<[Value]>::to_vec),
            had_trigger: trigger.is_some(),
            time: context.current_time(),
            thread: std::thread::current().name().map(String::from),
            at: Instant::now(),
        });
        cv.notify_all();
    }

    pub(crate) fn calls(&self) -> Vec<CallRecord> {
        self.inner.0.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.name).collect()
    }

    /// Block until at least `n` calls were recorded.  `false` on timeout.
    pub(crate) fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let (calls, cv) = &*self.inner;
        let guard = calls.lock().unwrap();
        let (guard, _) = cv
            .wait_timeout_while(guard, timeout, |calls| calls.len() < n)
            .unwrap();
        guard.len() >= n
    }

    fn build(&self, name: &str, outcome: Outcome) -> Arc<dyn Runnable> {
        Arc::new(RecordingRunnable {
            name: name.to_string(),
            recorder: self.clone(),
            outcome,
        })
    }

    pub(crate) fn runnable(&self, name: &str) -> Arc<dyn Runnable> {
        self.build(name, Outcome::Succeed)
    }

    pub(crate) fn failing(&self, name: &str) -> Arc<dyn Runnable> {
        self.build(name, Outcome::Fail)
    }

    pub(crate) fn panicking(&self, name: &str) -> Arc<dyn Runnable> {
        self.build(name, Outcome::Panic)
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Succeed,
    Fail,
    Panic,
}

struct RecordingRunnable {
    name: String,
    recorder: Recorder,
    outcome: Outcome,
}

impl Runnable for RecordingRunnable {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        context: &dyn ExecutionContext,
        args: Option<&[Value]>,
        trigger: Option<&Arc<dyn Trigger>>,
    ) -> Result<Vec<Value>, InvocationError> {
        self.recorder.record(&self.name, context, args, trigger);
        match self.outcome {
            Outcome::Succeed => Ok(Vec::new()),
            Outcome::Fail => Err(InvocationError::failed("rule data missing")),
            Outcome::Panic => panic!("{} exploded", self.name),
        }
    }
}

// ── TestModule ────────────────────────────────────────────────────────────────

type Body = Box<dyn Fn(&dyn ExecutionContext) -> Result<(), InvocationError> + Send + Sync>;

pub(crate) struct TestModule {
    name: String,
    priority: f64,
    triggers: Vec<Arc<dyn Trigger>>,
    triggers_fail: bool,
    recorder: Recorder,
    body: Option<Body>,
}

impl TestModule {
    fn build(
        name: &str,
        priority: f64,
        triggers: Vec<Arc<TestTrigger>>,
        recorder: &Recorder,
        triggers_fail: bool,
        body: Option<Body>,
    ) -> Arc<dyn Module> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            triggers: triggers
                .into_iter()
                .map(|t| t as Arc<dyn Trigger>)
                .collect(),
            triggers_fail,
            recorder: recorder.clone(),
            body,
        })
    }

    pub(crate) fn new(
        name: &str,
        priority: f64,
        triggers: Vec<Arc<TestTrigger>>,
        recorder: &Recorder,
    ) -> Arc<dyn Module> {
        Self::build(name, priority, triggers, recorder, false, None)
    }

    /// Module driven by arbitrary triggers.
    pub(crate) fn with_triggers(
        name: &str,
        priority: f64,
        triggers: Vec<Arc<dyn Trigger>>,
        recorder: &Recorder,
    ) -> Arc<dyn Module> {
        Arc::new(Self {
            name: name.to_string(),
            priority,
            triggers,
            triggers_fail: false,
            recorder: recorder.clone(),
            body: None,
        })
    }

    /// Module whose trigger list cannot be produced.
    pub(crate) fn failing_triggers(
        name: &str,
        priority: f64,
        recorder: &Recorder,
    ) -> Arc<dyn Module> {
        Self::build(name, priority, Vec::new(), recorder, true, None)
    }

    /// Module running `body` after recording the call.
    pub(crate) fn with_body(
        name: &str,
        priority: f64,
        triggers: Vec<Arc<TestTrigger>>,
        recorder: &Recorder,
        body: impl Fn(&dyn ExecutionContext) -> Result<(), InvocationError> + Send + Sync + 'static,
    ) -> Arc<dyn Module> {
        Self::build(name, priority, triggers, recorder, false, Some(Box::new(body)))
    }
}

impl Runnable for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        context: &dyn ExecutionContext,
        args: Option<&[Value]>,
        trigger: Option<&Arc<dyn Trigger>>,
    ) -> Result<Vec<Value>, InvocationError> {
        self.recorder.record(&self.name, context, args, trigger);
        if let Some(body) = &self.body {
            body(context)?;
        }
        Ok(Vec::new())
    }
}

impl Module for TestModule {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn triggers(
        &self,
        _context: &dyn ExecutionContext,
    ) -> Result<Vec<Arc<dyn Trigger>>, InvocationError> {
        if self.triggers_fail {
            return Err(InvocationError::failed("trigger data unavailable"));
        }
        Ok(self.triggers.clone())
    }
}

// ── TestTrigger ───────────────────────────────────────────────────────────────

/// Trigger with a settable due time and an optional firing event name.
#[derive(Debug, Default)]
pub(crate) struct TestTrigger {
    due: Mutex<Option<DateTime<Utc>>>,
    event: Option<String>,
    panics: bool,
    recorded: Mutex<Vec<String>>,
}

impl TestTrigger {
    pub(crate) fn idle() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn due_at(t: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            due: Mutex::new(Some(t)),
            ..Self::default()
        })
    }

    pub(crate) fn on_event(name: &str) -> Arc<Self> {
        Arc::new(Self {
            event: Some(name.to_string()),
            ..Self::default()
        })
    }

    /// Trigger whose due-time computation panics.
    pub(crate) fn panicking() -> Arc<Self> {
        Arc::new(Self {
            panics: true,
            ..Self::default()
        })
    }

    pub(crate) fn set_due(&self, due: Option<DateTime<Utc>>) {
        *self.due.lock().unwrap() = due;
    }

    pub(crate) fn recorded(&self) -> Vec<String> {
        self.recorded.lock().unwrap().clone()
    }
}

impl Trigger for TestTrigger {
    fn next_due_time(
        &self,
        _context: &dyn ExecutionContext,
    ) -> Result<Option<DateTime<Utc>>, InvocationError> {
        if self.panics {
            panic!("due time computation blew up");
        }
        Ok(*self.due.lock().unwrap())
    }

    fn fires_on(&self, event: &Event) -> bool {
        self.event.as_deref().is_some_and(|name| event.is(name))
    }

    fn record_event(&self, event: &Event) {
        self.recorded.lock().unwrap().push(event.name.clone());
    }
}
