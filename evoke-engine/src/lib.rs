/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Evoke engine – priority-ordered, single-timeline scheduler for clinical
//! decision-support rule modules.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── event       – domain events handed to triggers
//! ├── module      – Runnable / Module / Trigger / ExecutionContext contracts
//! ├── context     – BaseExecutionContext (system or manual clock)
//! ├── message     – queue messages and their priorities
//! ├── queue       – blocking priority queue
//! ├── deferred    – delayed insertion into the queue
//! ├── engine/     – EvokeEngine, EngineHandle, consumer loop, stats
//! ├── trigger     – reference trigger implementations
//! ├── config/     – engine settings and YAML workloads
//! └── declared    – modules built from workload declarations
//! ```

pub mod config;
pub mod context;
pub mod declared;
pub mod deferred;
pub mod engine;
pub mod event;
pub mod message;
pub mod module;
pub mod queue;
pub mod trigger;
