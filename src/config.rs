// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the offline queue and sync orchestrator.
//!
//! # Example
//!
//! ```
//! use offline_sync::{SyncConfig, ConflictStrategy};
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.batch_size, 10);
//! assert!(config.continue_on_error);
//!
//! // Full config
//! let config = SyncConfig {
//!     store_path: Some("./offline_queue.db".into()),
//!     batch_size: 4,
//!     continue_on_error: false,
//!     conflict_strategy: ConflictStrategy::Merge,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;
use crate::remote::ConflictStrategy;

/// Configuration for the offline queue.
///
/// All fields have defaults, so an empty TOML/JSON table is a valid config.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// SQLite file holding the pending queue (default: `./offline_queue.db`)
    #[serde(default)]
    pub store_path: Option<String>,

    /// Max records before saves fail with a capacity fault (None = unbounded)
    #[serde(default)]
    pub store_max_items: Option<u64>,

    /// Items dispatched concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Keep going after an item fails (false = abort the run on first failure)
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,

    /// Hint forwarded to the remote with every item
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,

    /// Periodic sync while online, in seconds (0 = only on reconnect)
    #[serde(default = "default_auto_sync_interval_secs")]
    pub auto_sync_interval_secs: u64,
}

fn default_batch_size() -> usize { 10 }
fn default_continue_on_error() -> bool { true }
fn default_auto_sync_interval_secs() -> u64 { 60 }

impl SyncConfig {
    /// Path of the store file, falling back to the default location.
    #[must_use]
    pub fn store_path_or_default(&self) -> String {
        self.store_path
            .clone()
            .unwrap_or_else(|| "./offline_queue.db".to_string())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            store_max_items: None,
            batch_size: default_batch_size(),
            continue_on_error: default_continue_on_error(),
            conflict_strategy: ConflictStrategy::default(),
            auto_sync_interval_secs: default_auto_sync_interval_secs(),
        }
    }
}
