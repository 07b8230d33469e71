// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Offline Sync
//!
//! A durable offline queue and sync orchestrator for local-first applications.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Queue Layer                          │
//! │  • UploadQueue: files waiting for upload (oldest first)     │
//! │  • MutationQueue: domain edits (newest first for review)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Local Store                           │
//! │  • OfflineItem records keyed "<category>-<id>"              │
//! │  • SqlStore (SQLite, survives restarts) or InMemoryStore    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    (SyncOrchestrator run)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Remote                              │
//! │  • RemoteSync trait, implemented by the application         │
//! │  • Batches dispatched concurrently, one batch at a time     │
//! │  • Confirmed items removed, failures stay queued            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use offline_sync::{SyncConfig, SyncOrchestrator, SqlStore, RemoteSync, UploadFile};
//! use serde_json::Map;
//!
//! # async fn example(remote: Arc<dyn RemoteSync>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let store = Arc::new(SqlStore::from_config(&config).await?);
//! let orchestrator = SyncOrchestrator::new(config, store, remote);
//!
//! // Queue work while offline
//! let file = UploadFile::new("photo.png", "image/png", vec![0x89, 0x50]);
//! orchestrator
//!     .uploads()
//!     .save_for_offline_upload(file, "card-1", "user-1", Map::new(), false)
//!     .await?;
//!
//! // Back online: push everything
//! let report = orchestrator.trigger_sync().await?;
//! println!("synced {} of {}", report.synced, report.total);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`offline_item`]: The [`OfflineItem`] record and its ordering rules
//! - [`storage`]: Local store backends (SQLite, memory)
//! - [`queue`]: Typed upload and mutation queues
//! - [`remote`]: The [`RemoteSync`] seam and conflict strategies
//! - [`coordinator`]: The [`SyncOrchestrator`]
//! - [`connectivity`]: Sync on reconnect and on a periodic timer
//! - [`resilience`]: Retry with backoff for store startup

pub mod config;
pub mod offline_item;
pub mod storage;
pub mod queue;
pub mod remote;
pub mod sync_options;
pub mod coordinator;
pub mod connectivity;
pub mod resilience;
pub mod metrics;

pub use config::SyncConfig;
pub use offline_item::{OfflineItem, SyncStatus, record_key};
pub use storage::traits::{LocalStore, StorageError};
pub use storage::memory::InMemoryStore;
pub use storage::sql::SqlStore;
pub use queue::{UploadQueue, UploadFile, PendingUpload, MutationQueue, PendingMutation};
pub use remote::{RemoteSync, RemoteError, ConflictStrategy};
pub use sync_options::{SyncOptions, ProgressCallback};
pub use coordinator::{
    SyncOrchestrator, RunState, RunOutcome, SyncReport, SyncStats, SyncActivity, ItemError, SyncError,
};
pub use connectivity::ConnectivityMonitor;
pub use resilience::retry::RetryConfig;
