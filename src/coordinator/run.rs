// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The sync run: enumerate, order, batch, dispatch, confirm.

use std::sync::atomic::Ordering;
use std::time::Instant;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, error};

use crate::offline_item::{sort_for_sync, OfflineItem};
use crate::queue::upload::{PendingUpload, UPLOAD_CATEGORY};
use crate::remote::ConflictStrategy;
use crate::sync_options::SyncOptions;

use super::{SyncOrchestrator, RunGuard, RunState, RunOutcome, SyncReport, ItemError, SyncError};

/// One unit of remote work.
enum SyncTask {
    Item(OfflineItem),
    Upload(PendingUpload),
}

impl SyncTask {
    fn category(&self) -> &str {
        match self {
            Self::Item(item) => &item.category,
            Self::Upload(_) => UPLOAD_CATEGORY,
        }
    }

    fn id(&self) -> &str {
        match self {
            Self::Item(item) => &item.id,
            Self::Upload(upload) => &upload.id,
        }
    }

    fn key(&self) -> String {
        crate::offline_item::record_key(self.category(), self.id())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Item(_) => "item",
            Self::Upload(_) => "upload",
        }
    }
}

/// Running totals for one run.
#[derive(Debug, Default)]
struct RunTally {
    total: usize,
    synced: usize,
    failed: usize,
    conflicts: usize,
    cancelled: bool,
}

impl SyncOrchestrator {
    /// Reconcile all pending records with the remote.
    ///
    /// Returns [`RunOutcome::Rejected`] with a zero count when another run is
    /// already active. With `continue_on_error == false` the first item
    /// failure ends the run with [`SyncError::Aborted`]; items confirmed
    /// before it stay removed.
    #[tracing::instrument(skip_all, fields(
        batch_size = options.effective_batch_size(),
        continue_on_error = options.continue_on_error,
        strategy = %options.conflict_strategy,
    ))]
    pub async fn sync(&self, options: SyncOptions) -> Result<SyncReport, SyncError> {
        // Flag and token change under one lock so a cancel that sees the
        // run as active always finds its token
        let token = {
            let mut slot = self.cancel_token.lock();
            if self.running.swap(true, Ordering::AcqRel) {
                debug!("Sync already running, request rejected");
                crate::metrics::record_run("rejected", std::time::Duration::ZERO);
                return Ok(SyncReport::rejected());
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };
        let _guard = RunGuard {
            running: &self.running,
            cancel_token: &self.cancel_token,
        };

        self.set_state(RunState::Running);
        let started = Instant::now();

        let mut tally = RunTally::default();
        let result = self.run_batches(&options, &token, &mut tally).await;
        let duration = started.elapsed();

        self.publish_run_stats(tally.synced, tally.failed, tally.conflicts).await;

        match result {
            Ok(()) => {
                let outcome = if tally.cancelled {
                    RunOutcome::Cancelled
                } else {
                    RunOutcome::Completed
                };
                let (state, label) = match outcome {
                    RunOutcome::Cancelled => (RunState::Cancelled, "cancelled"),
                    _ => (RunState::Completed, "completed"),
                };
                self.set_state(state);
                crate::metrics::record_run(label, duration);

                info!(
                    synced = tally.synced,
                    failed = tally.failed,
                    conflicts = tally.conflicts,
                    total = tally.total,
                    ?duration,
                    outcome = label,
                    "Sync run finished"
                );

                Ok(SyncReport {
                    outcome,
                    synced: tally.synced,
                    failed: tally.failed,
                    conflicts: tally.conflicts,
                    total: tally.total,
                    duration,
                })
            }
            Err(e) => {
                self.set_state(RunState::Aborted);
                crate::metrics::record_run("aborted", duration);
                error!(error = %e, synced = tally.synced, total = tally.total, "Sync run aborted");
                Err(e)
            }
        }
    }

    async fn run_batches(
        &self,
        options: &SyncOptions,
        token: &CancellationToken,
        tally: &mut RunTally,
    ) -> Result<(), SyncError> {
        let mut items: Vec<OfflineItem> = self
            .store
            .list(None)
            .await?
            .into_iter()
            .filter(|item| item.category != UPLOAD_CATEGORY)
            .collect();
        sort_for_sync(&mut items);

        let mut uploads = Vec::new();
        let mut unreadable = 0;
        for item in self.uploads.pending_upload_items().await? {
            match PendingUpload::from_item(&item) {
                Ok(upload) => uploads.push(SyncTask::Upload(upload)),
                Err(e) => {
                    // Left in place; nothing the remote could do with it
                    warn!(key = %item.key(), error = %e, "Skipping unreadable pending upload");
                    unreadable += 1;
                }
            }
        }

        let items: Vec<SyncTask> = items.into_iter().map(SyncTask::Item).collect();
        tally.failed += unreadable;
        tally.total = items.len() + uploads.len() + unreadable;

        info!(items = items.len(), uploads = uploads.len(), unreadable, "Starting sync run");

        for population in [items, uploads] {
            self.dispatch_batches(&population, options, token, tally).await?;
            if tally.cancelled {
                break;
            }
        }

        Ok(())
    }

    async fn dispatch_batches(
        &self,
        tasks: &[SyncTask],
        options: &SyncOptions,
        token: &CancellationToken,
        tally: &mut RunTally,
    ) -> Result<(), SyncError> {
        let batch_size = options.effective_batch_size();

        for (index, batch) in tasks.chunks(batch_size).enumerate() {
            if token.is_cancelled() {
                tally.cancelled = true;
                return Ok(());
            }

            debug!(batch = index + 1, size = batch.len(), "Dispatching batch");
            crate::metrics::record_batch_size(batch.len());

            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .map(|task| self.sync_one(task, options.conflict_strategy))
                .collect();

            // The whole batch settles before anything else happens, even on
            // failure or cancel, so no in-flight call is dropped half way
            let mut first_error: Option<ItemError> = None;
            while let Some(result) = in_flight.next().await {
                match result {
                    Ok(()) => {
                        tally.synced += 1;
                        options.report_progress(tally.synced, tally.total);
                    }
                    Err(e) => {
                        tally.failed += 1;
                        if e.is_conflict() {
                            tally.conflicts += 1;
                        }
                        warn!(key = %e.key(), error = %e, "Item sync failed, leaving it queued");
                        if !options.continue_on_error && first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }

                if token.is_cancelled() {
                    tally.cancelled = true;
                }
            }

            if let Some(source) = first_error {
                return Err(SyncError::Aborted {
                    synced: tally.synced,
                    source,
                });
            }

            if tally.cancelled {
                info!(synced = tally.synced, batch = index + 1, "Sync cancelled, remaining batches skipped");
                return Ok(());
            }
        }

        Ok(())
    }

    /// Send one task to the remote, then remove it locally on success.
    async fn sync_one(&self, task: &SyncTask, strategy: ConflictStrategy) -> Result<(), ItemError> {
        let started = Instant::now();
        let sent = match task {
            SyncTask::Item(item) => self.remote.push_item(item, strategy).await,
            SyncTask::Upload(upload) => self.remote.upload(upload, strategy).await,
        };

        if let Err(source) = sent {
            crate::metrics::record_item(task.kind(), source.kind());
            return Err(ItemError::Remote { key: task.key(), source });
        }

        if let Err(source) = self.store.remove(task.category(), task.id()).await {
            crate::metrics::record_item(task.kind(), "remove_failed");
            return Err(ItemError::Storage { key: task.key(), source });
        }

        crate::metrics::record_item(task.kind(), "synced");
        crate::metrics::record_item_latency(task.kind(), started.elapsed());
        debug!(key = %task.key(), "Item synced and removed");
        Ok(())
    }
}
