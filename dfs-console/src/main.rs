//! DFS console
//!
//! Replays a radar scenario against the NOL manager over a simulated
//! wireless stack, persisting the NOL between runs.

mod scenario;
mod settings;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dfs_nol::{DfsHooks, ExpiryScheduler, NolManager, TokioScheduler};
use dfs_sim::VirtualWifiStack;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::Settings;
use crate::state::{unix_now_ms, StateFile};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dfs_console=info,dfs_nol=info,dfs_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DFS console");

    let settings = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Settings::load_from(&path).unwrap_or_else(|e| {
            tracing::error!("{}; using defaults", e);
            Settings::default()
        }),
        None => match Settings::settings_path() {
            Some(path) => Settings::load_or_create(&path).unwrap_or_else(|e| {
                tracing::warn!("{}; using defaults", e);
                Settings::default()
            }),
            None => Settings::default(),
        },
    };

    let scheduler = match TokioScheduler::from_current() {
        Ok(scheduler) => Arc::new(scheduler),
        Err(e) => {
            tracing::error!("Cannot start NOL timers: {}", e);
            return;
        }
    };

    let stack = VirtualWifiStack::new(settings.channels.iter().copied());
    stack.set_current_channel(settings.operating_channel);
    let nol = NolManager::new(
        settings.nol.clone(),
        scheduler.clone(),
        DfsHooks::from_stack(Arc::new(stack.clone())),
    );
    let logger = scenario::spawn_event_logger(nol.subscribe());

    if let Some(path) = &settings.state_file {
        match StateFile::load(path) {
            Ok(saved) => {
                let records = saved.rebase(scheduler.now_ticks(), unix_now_ms());
                if !records.is_empty() {
                    nol.restore(&records);
                }
            }
            Err(e) => tracing::warn!("{}; starting with an empty NOL", e),
        }
    }

    let report = scenario::replay(
        &nol,
        &stack,
        &settings.sorted_scenario(),
        Duration::from_millis(settings.run_for_ms),
        async {
            // Without a signal handler there is nothing to wait for
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
    )
    .await;

    tracing::info!(
        radar_events = report.radar_events,
        exhausted = report.exhausted,
        current_channel = ?stack.current_channel(),
        "Scenario finished"
    );
    nol.log_nol();

    if let Some(path) = &settings.state_file {
        let state = StateFile::capture(nol.snapshot(), scheduler.now_ticks(), unix_now_ms());
        match state.save(path) {
            Ok(()) => tracing::info!(
                entries = state.records.len(),
                path = %path.display(),
                "NOL saved"
            ),
            Err(e) => tracing::error!("{}", e),
        }
    }

    nol.cleanup();
    drop(nol);
    if let Err(e) = logger.await {
        tracing::warn!("Event logger task failed: {}", e);
    }
}
