/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use evoke_engine::config::WorkloadConfig;
use evoke_engine::context::BaseExecutionContext;
use evoke_engine::declared::DeclaredModule;
use evoke_engine::engine::EvokeEngine;
use evoke_engine::event::Event;
use evoke_engine::module::{Module, Runnable};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Evoke engine demo runner.
///
/// Example:
///   evoke-engine --workload evoke-engine/demos/workload.yaml --run-for-ms 5000
#[derive(Debug, Parser)]
#[command(
    name = "evoke-engine",
    about = "Evoke engine – runs a declared workload of rule modules",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML workload file (built-in demo when absent).
    #[arg(short = 'w', long = "workload")]
    workload: Option<PathBuf>,

    /// How long to let the engine run before stopping it.
    #[arg(short = 't', long = "run-for-ms", default_value_t = 3000)]
    run_for_ms: u64,
}

// ── Entry point ───────────────────────────────────────────────────────────────

// Plain `fn main`: the engine owns its own timer runtime, which must not be
// dropped from inside another runtime.
fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Evoke engine starting up...");

    // ── Parse CLI arguments ───────────────────────────────────────────────────
    let cli = Cli::parse();

    info!(
        workload   = ?cli.workload,
        run_for_ms = cli.run_for_ms,
        "Configuration"
    );

    // ── Load workload ─────────────────────────────────────────────────────────
    let workload = match &cli.workload {
        Some(path) => WorkloadConfig::load_from_file(path),
        None => {
            warn!("No workload file provided, using the built-in demo workload");
            WorkloadConfig::demo()
        }
    };
    let workload = match workload {
        Ok(w) => w,
        Err(e) => {
            error!("Failed to load workload: {:#}", e);
            process::exit(1);
        }
    };

    // ── Build and start the engine ────────────────────────────────────────────
    let declared = DeclaredModule::from_decls(&workload.modules);
    let modules: Vec<Arc<dyn Module>> = declared
        .iter()
        .map(|m| m.clone() as Arc<dyn Module>)
        .collect();

    let context = Arc::new(BaseExecutionContext::system());
    let mut engine = match EvokeEngine::with_config(context, modules, workload.engine.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to create engine: {:#}", anyhow::Error::from(e));
            process::exit(1);
        }
    };
    if let Err(e) = engine.start() {
        error!("Failed to start engine: {:#}", anyhow::Error::from(e));
        process::exit(1);
    }

    // ── Submit declared events ────────────────────────────────────────────────
    for event in &workload.events {
        let time = event.time.unwrap_or_else(Utc::now);
        engine.submit_event(
            Event::new(event.name.clone(), time),
            Duration::from_millis(event.delay_ms),
            event.urgency,
        );
    }

    thread::sleep(Duration::from_millis(cli.run_for_ms));
    engine.stop();

    // ── Report ────────────────────────────────────────────────────────────────
    let stats = engine.stats();
    info!(
        events            = stats.events,
        invocations       = stats.invocations,
        invocation_faults = stats.invocation_faults,
        trigger_faults    = stats.trigger_faults,
        deferred_dropped  = stats.deferred_dropped,
        "Engine statistics"
    );
    for module in &declared {
        info!(
            "  [{name}]  invocations={count}  {desc}",
            name = module.name(),
            count = module.invocations(),
            desc = module.description(),
        );
    }
}
