// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync orchestrator.
//!
//! The [`SyncOrchestrator`] reconciles everything in the local store with the
//! remote in one controlled run:
//! - generic items (mutations and other categories) sorted by priority
//! - pending uploads, oldest first
//! - fixed-size batches dispatched concurrently, one batch at a time
//! - confirmed items removed, failed items left for the next run
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Running → Completed | Aborted | Cancelled
//! ```
//!
//! At most one run is active per orchestrator. A second call while a run is
//! active returns immediately with [`RunOutcome::Rejected`] and a zero count.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use offline_sync::{SyncOrchestrator, SyncConfig, SqlStore, RemoteSync, RunState};
//!
//! # async fn example(remote: Arc<dyn RemoteSync>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let store = Arc::new(SqlStore::from_config(&config).await?);
//! let orchestrator = SyncOrchestrator::new(config, store, remote);
//!
//! assert_eq!(orchestrator.state(), RunState::Idle);
//!
//! let report = orchestrator.trigger_sync().await?;
//! println!("synced {} of {}", report.synced, report.total);
//! # Ok(())
//! # }
//! ```

mod types;
mod run;

pub use types::{RunState, RunOutcome, SyncReport, SyncStats, SyncActivity, ItemError, SyncError};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::queue::{MutationQueue, UploadQueue};
use crate::remote::RemoteSync;
use crate::storage::traits::{LocalStore, StorageError};
use crate::sync_options::SyncOptions;

/// Reconciles the local queue with the remote.
///
/// Construct one per queue; the store and remote are injected so tests and
/// independent queues never share hidden state.
///
/// # Thread Safety
///
/// The orchestrator is `Send + Sync`. Share it behind an `Arc` between the
/// connectivity monitor, UI handlers and background tasks.
pub struct SyncOrchestrator {
    pub(super) config: SyncConfig,

    pub(super) store: Arc<dyn LocalStore>,

    pub(super) remote: Arc<dyn RemoteSync>,

    pub(super) uploads: UploadQueue,

    pub(super) mutations: MutationQueue,

    /// Re-entrancy guard: true while a run is active
    pub(super) running: AtomicBool,

    /// Last known connectivity, set by the connectivity monitor
    pub(super) online: AtomicBool,

    /// Token of the active run, if any
    pub(super) cancel_token: Mutex<Option<CancellationToken>>,

    /// Run state (broadcast to watchers)
    pub(super) state: watch::Sender<RunState>,

    pub(super) state_rx: watch::Receiver<RunState>,

    /// Aggregate stats (broadcast to indicators)
    pub(super) stats: watch::Sender<SyncStats>,

    /// Items synced since creation
    pub(super) total_synced: AtomicU64,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteSync>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        let (stats_tx, _) = watch::channel(SyncStats::default());

        Self {
            config,
            uploads: UploadQueue::new(store.clone()),
            mutations: MutationQueue::new(store.clone()),
            store,
            remote,
            running: AtomicBool::new(false),
            online: AtomicBool::new(true),
            cancel_token: Mutex::new(None),
            state: state_tx,
            state_rx,
            stats: stats_tx,
            total_synced: AtomicU64::new(0),
        }
    }

    /// Upload queue sharing this orchestrator's store.
    #[must_use]
    pub fn uploads(&self) -> &UploadQueue {
        &self.uploads
    }

    /// Mutation queue sharing this orchestrator's store.
    #[must_use]
    pub fn mutations(&self) -> &MutationQueue {
        &self.mutations
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Get current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<RunState> {
        self.state_rx.clone()
    }

    /// Latest aggregate stats.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.borrow().clone()
    }

    /// Subscribe to stats updates (published after every run and refresh).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStats> {
        self.stats.subscribe()
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::AcqRel);
        crate::metrics::set_online(online);
        if was != online {
            info!(online, "Connectivity changed");
        }
    }

    #[must_use]
    pub fn status(&self) -> SyncActivity {
        SyncActivity {
            is_syncing: self.is_syncing(),
            is_online: self.is_online(),
        }
    }

    /// Request cancellation of the active run.
    ///
    /// Items already dispatched are allowed to finish; no further batch is
    /// started. Does nothing when no run is active.
    pub fn cancel(&self) {
        match self.cancel_token.lock().as_ref() {
            Some(token) => {
                info!("Sync cancellation requested");
                token.cancel();
            }
            None => debug!("Cancel requested with no active sync run"),
        }
    }

    /// Run a sync with options taken from the orchestrator's config.
    pub async fn trigger_sync(&self) -> Result<SyncReport, SyncError> {
        self.sync(SyncOptions::from_config(&self.config)).await
    }

    /// Recount pending records and publish fresh stats.
    pub async fn refresh_stats(&self) -> Result<SyncStats, StorageError> {
        let pending = self.store.count().await?;
        crate::metrics::set_pending_items(pending);
        self.stats.send_modify(|stats| stats.pending = pending);
        Ok(self.stats())
    }

    pub(super) fn set_state(&self, state: RunState) {
        let _ = self.state.send(state);
    }

    /// Publish stats after a finished run.
    pub(super) async fn publish_run_stats(&self, synced: usize, failed: usize, conflicts: usize) {
        let total = self.total_synced.fetch_add(synced as u64, Ordering::AcqRel) + synced as u64;
        let pending = match self.store.count().await {
            Ok(pending) => {
                crate::metrics::set_pending_items(pending);
                Some(pending)
            }
            Err(e) => {
                warn!(error = %e, "Failed to count pending records after sync run");
                None
            }
        };

        self.stats.send_modify(|stats| {
            if let Some(pending) = pending {
                stats.pending = pending;
            }
            stats.synced = total;
            stats.failed = failed as u64;
            stats.conflicts = conflicts as u64;
            stats.last_sync_at = Some(crate::offline_item::now_millis());
        });
    }
}

/// RAII guard that clears the running flag and the run's cancel token.
pub(super) struct RunGuard<'a> {
    pub(super) running: &'a AtomicBool,
    pub(super) cancel_token: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.cancel_token.lock() = None;
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests;
