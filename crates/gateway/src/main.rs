// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the queue, router, scheduler, dispatcher, and event hub into
//! one running process.
//!
//! Everything outside that core — the HTTP control plane, configuration
//! sealing, plugin manifest discovery, the PID-file lock — is treated
//! as an external collaborator and is not built here. [`config`] reads
//! one plain YAML file; that is the full extent of this binary's
//! configuration story.

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use oj_engine::{Dispatcher, EventHub, InMemoryRegistry, Scheduler, ScheduleDecl, TokioProcessAdapter};
use oj_pipeline::{compile_all, parse_decls, Router};
use oj_storage::{NullWorkspace, Storage};

use config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config_path: PathBuf = std::env::var_os("OJ_GATEWAY_CONFIG").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("gateway.yaml"));
    let config_text = std::fs::read_to_string(&config_path).map_err(|e| format!("reading {}: {e}", config_path.display()))?;
    let config: GatewayConfig = serde_yaml::from_str(&config_text)?;

    let storage = Storage::open(&config.db_path)?;

    let pipelines_text = std::fs::read_to_string(&config.pipelines_path).map_err(|e| format!("reading {}: {e}", config.pipelines_path.display()))?;
    let decls = parse_decls(&pipelines_text)?;
    let compiled = compile_all(&decls)?;
    let router = Arc::new(Router::new(compiled));

    let registry = Arc::new(InMemoryRegistry::new(config.plugins.into_iter().map(Into::into)));
    let schedules: Vec<ScheduleDecl> = config.schedules.into_iter().map(Into::into).collect();
    let hub = Arc::new(EventHub::default());

    let scheduler = Scheduler::new(storage.clone(), registry.clone(), hub.clone(), config.service_name.clone());
    scheduler.recover_orphans()?;

    let dispatcher = Arc::new(Dispatcher::new(storage, registry, router, TokioProcessAdapter, hub, Arc::new(NullWorkspace)));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let scheduler_rx = shutdown_rx.clone();
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(schedules, Duration::from_secs(config.tick_interval_secs), scheduler_rx).await;
    });

    let dispatcher_for_run = dispatcher.clone();
    let dispatcher_rx = shutdown_rx.clone();
    let dispatcher_task = tokio::spawn(async move {
        dispatcher_for_run.run(Duration::from_secs(config.poll_interval_secs), dispatcher_rx).await;
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining loops");
    let _ = shutdown_tx.send(true);

    let _ = tokio::join!(scheduler_task, dispatcher_task);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
