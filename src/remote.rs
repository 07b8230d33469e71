// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote sync endpoint seam.
//!
//! The orchestrator forwards each pending record to a [`RemoteSync`]
//! implementation together with a [`ConflictStrategy`] hint. Conflict
//! resolution happens entirely on the remote side.
//!
//! Implementations must tolerate retries: an item whose call failed locally
//! (for example a timeout after the server already accepted it) is sent
//! again on the next run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::offline_item::OfflineItem;
use crate::queue::upload::PendingUpload;

/// How the remote should resolve a collision between local and server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    #[default]
    ClientWins,
    ServerWins,
    Merge,
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientWins => write!(f, "client_wins"),
            Self::ServerWins => write!(f, "server_wins"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Failure of a single remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote call timed out")]
    Timeout,
    #[error("Remote rejected item: {0}")]
    Rejected(String),
    #[error("Remote reported a conflict: {0}")]
    Conflict(String),
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
    #[error("Remote error: {0}")]
    Other(String),
}

impl RemoteError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Rejected(_) => "rejected",
            Self::Conflict(_) => "conflict",
            Self::Unavailable(_) => "unavailable",
            Self::Other(_) => "other",
        }
    }
}

#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// Send one generic pending record (domain mutation, comment, ...).
    async fn push_item(&self, item: &OfflineItem, strategy: ConflictStrategy) -> Result<(), RemoteError>;

    /// Send one pending file upload.
    async fn upload(&self, upload: &PendingUpload, strategy: ConflictStrategy) -> Result<(), RemoteError>;
}
