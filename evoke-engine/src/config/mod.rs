/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Engine settings and declarative workload loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! engine:
//!   deferred_workers: 1
//! modules:
//!   sepsis_screen:
//!     priority: 90
//!     description: "qSOFA screen on new labs"
//!     triggers:
//!       - event: lab_result
//!       - delayed_event: { event: admission, delay_ms: 500 }
//!       - cyclic: { interval_ms: 1000 }
//!       - at: "2026-10-18T12:00:00Z"
//! events:
//!   - { name: lab_result, delay_ms: 0, urgency: 50 }
//! ```
//!
//! Every section is optional.  Priorities and urgencies are checked here,
//! once, when the file is loaded; the engine's entry points do not validate.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Workload used by the binary when no file is given.
pub const DEMO_WORKLOAD: &str = include_str!("../../demos/workload.yaml");

/// Valid range for module priorities and event urgencies.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<u8> = 1..=99;

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Threading settings for [`EvokeEngine`](crate::engine::EvokeEngine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the consumer thread spawned by `start()`.
    pub consumer_thread_name: String,
    /// Worker threads of the deferred submission runtime.
    pub deferred_workers: usize,
    pub deferred_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            consumer_thread_name: String::from("evoke-engine"),
            deferred_workers: 1,
            deferred_thread_name: String::from("evoke-deferred"),
        }
    }
}

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct WorkloadFile {
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    modules: BTreeMap<String, ModuleEntry>,
    #[serde(default)]
    events: Vec<EventDecl>,
}

#[derive(Debug, Deserialize)]
struct ModuleEntry {
    priority: f64,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    triggers: Vec<TriggerDecl>,
    description: Option<String>,
}

// ── Public data structures ────────────────────────────────────────────────────

/// One trigger declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDecl {
    /// Fire immediately on every event with this name.
    Event(String),
    /// Become due `delay_ms` after each event with this name.
    DelayedEvent { event: String, delay_ms: u64 },
    /// Become due every `interval_ms`, aligned to `start` when given.
    Cyclic {
        interval_ms: u64,
        #[serde(default)]
        start: Option<DateTime<Utc>>,
    },
    /// Become due once at a fixed instant.
    At(DateTime<Utc>),
}

/// A module declared in the workload.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub name: String,
    pub priority: f64,
    pub triggers: Vec<TriggerDecl>,
    pub description: String,
}

/// An event the binary submits once the engine has started.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventDecl {
    pub name: String,
    /// Submission delay.
    #[serde(default)]
    pub delay_ms: u64,
    pub urgency: u8,
    /// Event time; the submission time when absent.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

/// A parsed and validated workload file.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub engine: EngineConfig,
    /// Declared modules, ordered by name.
    pub modules: Vec<ModuleDecl>,
    pub events: Vec<EventDecl>,
}

impl WorkloadConfig {
    /// Parses `path` and validates its content.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, if the YAML is
    /// structurally invalid, or if a priority or urgency is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        info!("Loading workload from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open workload file: {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid workload file: {}", path.display()))
    }

    /// The built-in demo workload.
    pub fn demo() -> Result<Self> {
        Self::from_yaml_str(DEMO_WORKLOAD).context("Invalid built-in demo workload")
    }

    /// Parses and validates a workload from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: WorkloadFile =
            serde_yaml::from_str(content).context("Failed to parse workload YAML")?;

        let modules: Vec<ModuleDecl> = file
            .modules
            .into_iter()
            .map(|(name, entry)| ModuleDecl {
                name,
                priority: entry.priority,
                triggers: entry.triggers,
                description: entry.description.unwrap_or_default(),
            })
            .collect();

        let workload = Self {
            engine: file.engine,
            modules,
            events: file.events,
        };
        workload.validate()?;

        if workload.modules.is_empty() {
            warn!("Workload declares no modules; events will not run anything");
        }
        for module in &workload.modules {
            debug!(
                "  Module: {} | priority: {} | triggers: {}",
                module.name,
                module.priority,
                module.triggers.len(),
            );
        }
        info!(
            "Workload ready: {} module(s), {} event(s)",
            workload.modules.len(),
            workload.events.len()
        );

        Ok(workload)
    }

    /// Checks ranges the engine relies on but does not check itself.
    pub fn validate(&self) -> Result<()> {
        let range = f64::from(*PRIORITY_RANGE.start())..=f64::from(*PRIORITY_RANGE.end());
        ensure!(
            self.engine.deferred_workers >= 1,
            "engine.deferred_workers must be at least 1"
        );

        for module in &self.modules {
            if !range.contains(&module.priority) {
                bail!(
                    "module '{}': priority {} outside {}..={}",
                    module.name,
                    module.priority,
                    PRIORITY_RANGE.start(),
                    PRIORITY_RANGE.end()
                );
            }
            for trigger in &module.triggers {
                match trigger {
                    TriggerDecl::Event(event) | TriggerDecl::DelayedEvent { event, .. } => {
                        ensure!(
                            !event.is_empty(),
                            "module '{}': trigger with an empty event name",
                            module.name
                        );
                    }
                    TriggerDecl::Cyclic { interval_ms, .. } => {
                        ensure!(
                            *interval_ms > 0,
                            "module '{}': cyclic interval must be positive",
                            module.name
                        );
                    }
                    TriggerDecl::At(_) => {}
                }
            }
        }

        for event in &self.events {
            ensure!(!event.name.is_empty(), "event with an empty name");
            if !PRIORITY_RANGE.contains(&event.urgency) {
                bail!(
                    "event '{}': urgency {} outside {}..={}",
                    event.name,
                    event.urgency,
                    PRIORITY_RANGE.start(),
                    PRIORITY_RANGE.end()
                );
            }
        }

        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
