// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sync orchestrator.

use std::time::Duration;
use serde::Serialize;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::traits::StorageError;

/// Orchestrator run state.
///
/// ```text
/// Idle → Running → Completed | Aborted | Cancelled → Running → ...
/// ```
///
/// Use [`super::SyncOrchestrator::state()`] to check the current state or
/// [`super::SyncOrchestrator::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// No run has happened yet
    Idle,
    /// A run is in progress
    Running,
    /// Last run went through every batch
    Completed,
    /// Last run stopped on a fail-fast error or a storage fault
    Aborted,
    /// Last run stopped on a cancel request
    Cancelled,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Aborted => write!(f, "Aborted"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// How a non-failing run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// Another run was already active; nothing was attempted
    Rejected,
}

/// Result of one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: RunOutcome,
    /// Items confirmed by the remote and removed locally
    pub synced: usize,
    /// Items whose attempt failed (still queued)
    pub failed: usize,
    /// Subset of `failed` the remote reported as conflicts
    pub conflicts: usize,
    /// Items enumerated at the start of the run, unreadable uploads included
    pub total: usize,
    pub duration: Duration,
}

impl SyncReport {
    pub(crate) fn rejected() -> Self {
        Self {
            outcome: RunOutcome::Rejected,
            synced: 0,
            failed: 0,
            conflicts: 0,
            total: 0,
            duration: Duration::ZERO,
        }
    }

    /// Every enumerated item was synced.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.failed == 0
    }
}

/// Aggregate figures for status indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Records currently in the local store
    pub pending: u64,
    /// Items synced since this orchestrator was created
    pub synced: u64,
    /// Items that failed in the most recent run
    pub failed: u64,
    /// Conflicts reported in the most recent run
    pub conflicts: u64,
    /// End of the most recent finished run (epoch millis)
    pub last_sync_at: Option<i64>,
}

/// Live flags for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncActivity {
    pub is_syncing: bool,
    pub is_online: bool,
}

/// Failure of a single item within a run.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("remote call for '{key}' failed: {source}")]
    Remote {
        key: String,
        source: RemoteError,
    },
    #[error("could not remove synced record '{key}': {source}")]
    Storage {
        key: String,
        source: StorageError,
    },
}

impl ItemError {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Remote { key, .. } | Self::Storage { key, .. } => key,
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Remote { source, .. } if source.is_conflict())
    }
}

/// Run-level failure returned to the caller of a sync.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Pending records could not be enumerated
    #[error("failed to read pending records: {0}")]
    Storage(#[from] StorageError),
    /// Fail-fast run stopped on an item failure. Items synced before the
    /// failure stay removed.
    #[error("sync aborted after {synced} item(s): {source}")]
    Aborted {
        synced: usize,
        source: ItemError,
    },
}
