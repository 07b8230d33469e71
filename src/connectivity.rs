// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connectivity glue.
//!
//! The [`ConnectivityMonitor`] listens to an external online/offline signal
//! (a `watch::Receiver<bool>` fed by whatever probes the network) and keeps
//! the orchestrator's `is_online` flag current. It triggers a sync:
//! - when the signal goes from offline to online
//! - on startup if already online
//! - on every interval tick while online, if an interval is configured
//!
//! Each sync is spawned; an overlapping trigger is simply rejected by the
//! orchestrator's re-entrancy guard.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::{RunOutcome, SyncOrchestrator};

/// Background task tying a connectivity signal to an orchestrator.
pub struct ConnectivityMonitor {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ConnectivityMonitor {
    /// Start watching `online_rx`. `interval` enables periodic sync while online.
    pub fn spawn(
        orchestrator: Arc<SyncOrchestrator>,
        online_rx: watch::Receiver<bool>,
        interval: Option<Duration>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            watch_connectivity(orchestrator, online_rx, interval, token).await;
        });

        Self { cancel_token, handle }
    }

    /// Start watching with the interval from the orchestrator's config
    /// (`auto_sync_interval_secs`, 0 = only on reconnect).
    pub fn from_config(orchestrator: Arc<SyncOrchestrator>, online_rx: watch::Receiver<bool>) -> Self {
        let secs = orchestrator.config().auto_sync_interval_secs;
        let interval = (secs > 0).then(|| Duration::from_secs(secs));
        Self::spawn(orchestrator, online_rx, interval)
    }

    /// Token that stops the monitor when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop the monitor and wait for its task to exit. A sync already
    /// spawned by the monitor keeps running to completion.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Connectivity monitor task ended abnormally");
        }
    }
}

async fn watch_connectivity(
    orchestrator: Arc<SyncOrchestrator>,
    mut online_rx: watch::Receiver<bool>,
    interval: Option<Duration>,
    cancel_token: CancellationToken,
) {
    let online = *online_rx.borrow_and_update();
    orchestrator.set_online(online);
    if online {
        spawn_sync(&orchestrator, "startup");
    }

    let mut ticker = interval.map(|period| {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    info!(?interval, online, "Connectivity monitor started");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,

            changed = online_rx.changed() => {
                if changed.is_err() {
                    debug!("Connectivity signal closed");
                    break;
                }
                let online = *online_rx.borrow_and_update();
                let was_online = orchestrator.is_online();
                orchestrator.set_online(online);
                if online && !was_online {
                    spawn_sync(&orchestrator, "reconnect");
                }
            }

            _ = next_tick(&mut ticker), if ticker.is_some() && orchestrator.is_online() => {
                spawn_sync(&orchestrator, "interval");
            }
        }
    }

    info!("Connectivity monitor stopped");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn spawn_sync(orchestrator: &Arc<SyncOrchestrator>, reason: &'static str) {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        match orchestrator.trigger_sync().await {
            Ok(report) if report.outcome == RunOutcome::Rejected => {
                debug!(reason, "Sync trigger skipped, a run is already active");
            }
            Ok(report) => {
                debug!(reason, synced = report.synced, failed = report.failed, "Triggered sync finished");
            }
            Err(e) => {
                warn!(reason, error = %e, "Triggered sync failed");
            }
        }
    });
}
