/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Modules built from workload declarations.
//!
//! A [`DeclaredModule`] has no clinical logic: its body logs the call,
//! counts it and returns a small JSON record.  It lets the binary drive the
//! engine from a YAML file.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use serde_json::json;
use tracing::info;

use crate::config::{ModuleDecl, TriggerDecl};
use crate::module::{ExecutionContext, InvocationError, Module, Runnable, Trigger, Value};
use crate::trigger::{CyclicTrigger, DelayedEventTrigger, EventTrigger, FixedTimeTrigger};

fn millis(ms: u64) -> ChronoDuration {
    ChronoDuration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Build the reference trigger matching a declaration.
pub fn build_trigger(decl: &TriggerDecl) -> Arc<dyn Trigger> {
    match decl {
        TriggerDecl::Event(event) => Arc::new(EventTrigger::new(event.clone())),
        TriggerDecl::DelayedEvent { event, delay_ms } => {
            Arc::new(DelayedEventTrigger::new(event.clone(), millis(*delay_ms)))
        }
        TriggerDecl::Cyclic { interval_ms, start } => {
            Arc::new(CyclicTrigger::new(millis(*interval_ms), *start))
        }
        TriggerDecl::At(at) => Arc::new(FixedTimeTrigger::new(*at)),
    }
}

/// Module whose body records and logs each invocation.
#[derive(Debug)]
pub struct DeclaredModule {
    name: String,
    priority: f64,
    description: String,
    triggers: Vec<Arc<dyn Trigger>>,
    invocations: AtomicU64,
}

impl DeclaredModule {
    pub fn new(decl: &ModuleDecl) -> Self {
        Self {
            name: decl.name.clone(),
            priority: decl.priority,
            description: decl.description.clone(),
            triggers: decl.triggers.iter().map(build_trigger).collect(),
            invocations: AtomicU64::new(0),
        }
    }

    /// Build every declared module, in declaration order.
    pub fn from_decls(decls: &[ModuleDecl]) -> Vec<Arc<DeclaredModule>> {
        decls.iter().map(|d| Arc::new(Self::new(d))).collect()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of times the body has run.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}

impl Runnable for DeclaredModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        context: &dyn ExecutionContext,
        args: Option<&[Value]>,
        trigger: Option<&Arc<dyn Trigger>>,
    ) -> Result<Vec<Value>, InvocationError> {
        let count = self.invocations.fetch_add(1, Ordering::Relaxed) + 1;
        let now = context.current_time();

        info!(
            module = %self.name,
            priority = self.priority,
            invocation = count,
            trigger = ?trigger,
            args = args.map_or(0, |a| a.len()),
            "module invoked"
        );

        Ok(vec![json!({
            "module": self.name,
            "invocation": count,
            "time": now.to_rfc3339(),
        })])
    }
}

impl Module for DeclaredModule {
    fn priority(&self) -> f64 {
        self.priority
    }

    fn triggers(
        &self,
        _context: &dyn ExecutionContext,
    ) -> Result<Vec<Arc<dyn Trigger>>, InvocationError> {
        Ok(self.triggers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadConfig;
    use crate::context::BaseExecutionContext;
    use crate::engine::EvokeEngine;
    use crate::event::Event;
    use chrono::{TimeZone, Utc};
    use std::time::{Duration, Instant};

    fn decl(triggers: Vec<TriggerDecl>) -> ModuleDecl {
        ModuleDecl {
            name: "sepsis_screen".into(),
            priority: 90.0,
            triggers,
            description: "qSOFA".into(),
        }
    }

    #[test]
    fn triggers_are_built_once_and_reused() {
        let ctx = BaseExecutionContext::manual(Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap());
        let module = DeclaredModule::new(&decl(vec![
            TriggerDecl::Event("lab_result".into()),
            TriggerDecl::Cyclic {
                interval_ms: 1000,
                start: None,
            },
        ]));

        let first = module.triggers(&ctx).unwrap();
        let second = module.triggers(&ctx).unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().zip(&second).all(|(a, b)| Arc::ptr_eq(a, b)));
        assert!(first[0].fires_on(&Event::new("lab_result", ctx.current_time())));
    }

    #[test]
    fn body_counts_and_reports_invocations() {
        let t = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        let ctx = BaseExecutionContext::manual(t);
        let module = DeclaredModule::new(&decl(vec![]));

        module.run(&ctx, None, None).unwrap();
        let out = module.run(&ctx, Some(&[json!(7), json!("mmol/L")]), None).unwrap();

        assert_eq!(module.invocations(), 2);
        assert_eq!(out[0]["module"], "sepsis_screen");
        assert_eq!(out[0]["invocation"], 2);
        assert_eq!(out[0]["time"], t.to_rfc3339());
    }

    #[test]
    fn declared_workload_runs_through_engine() {
        let workload = WorkloadConfig::from_yaml_str(
            "modules:\n  screen:\n    priority: 50\n    triggers:\n      - event: lab_result\n",
        )
        .unwrap();
        let declared = DeclaredModule::from_decls(&workload.modules);
        let modules: Vec<Arc<dyn Module>> = declared
            .iter()
            .map(|m| m.clone() as Arc<dyn Module>)
            .collect();

        let ctx = Arc::new(BaseExecutionContext::system());
        let mut engine = EvokeEngine::with_config(ctx, modules, workload.engine).unwrap();
        engine.start().unwrap();
        engine.submit_event(Event::new("lab_result", Utc::now()), Duration::ZERO, 50);

        let deadline = Instant::now() + Duration::from_secs(5);
        while declared[0].invocations() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        engine.stop();
        assert_eq!(declared[0].invocations(), 1);
    }
}
