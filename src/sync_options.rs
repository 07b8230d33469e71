// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-run options for the sync orchestrator.
//!
//! The orchestrator never decides policy on its own: batch size, failure
//! handling and the conflict hint all come from the caller, either from
//! [`SyncConfig`](crate::SyncConfig) via [`SyncOptions::from_config`] or
//! set explicitly for one run.
//!
//! # Example
//!
//! ```rust
//! use offline_sync::{SyncOptions, ConflictStrategy};
//!
//! // Defaults: batches of 10, keep going past failures
//! let opts = SyncOptions::default();
//! assert_eq!(opts.batch_size, 10);
//!
//! // Stop at the first failure, one item at a time
//! let opts = SyncOptions::fail_fast().with_batch_size(1);
//! assert!(!opts.continue_on_error);
//!
//! // Push-style progress reporting
//! let opts = SyncOptions::default()
//!     .with_strategy(ConflictStrategy::ServerWins)
//!     .with_progress(|synced, total| println!("{synced}/{total}"));
//! ```

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::remote::ConflictStrategy;

/// Progress callback: `(synced_so_far, total)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

#[derive(Clone)]
pub struct SyncOptions {
    /// Items dispatched concurrently per batch (clamped to at least 1)
    pub batch_size: usize,
    /// Leave failed items queued and keep going (false = abort the run)
    pub continue_on_error: bool,
    /// Forwarded to every remote call, never interpreted locally
    pub conflict_strategy: ConflictStrategy,
    /// Called after every confirmed item
    pub on_progress: Option<ProgressCallback>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("batch_size", &self.batch_size)
            .field("continue_on_error", &self.continue_on_error)
            .field("conflict_strategy", &self.conflict_strategy)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl SyncOptions {
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            continue_on_error: config.continue_on_error,
            conflict_strategy: config.conflict_strategy,
            on_progress: None,
        }
    }

    /// Abort on the first failed item.
    #[must_use]
    pub fn fail_fast() -> Self {
        Self {
            continue_on_error: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Batch size actually used by a run.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub(crate) fn report_progress(&self, synced: usize, total: usize) {
        if let Some(ref callback) = self.on_progress {
            callback(synced, total);
        }
    }
}
