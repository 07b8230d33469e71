// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offline item data structure.
//!
//! The [`OfflineItem`] is the unit of pending state that flows through the
//! queue. Every record in the local store is an `OfflineItem`, addressed by
//! the pair `(category, id)`. The `"<category>-<id>"` form is for logs and
//! error messages only. Typed views such as pending uploads and pending
//! mutations are thin conversions on top of it.
//!
//! # Example
//!
//! ```
//! use offline_sync::{OfflineItem, SyncStatus};
//! use serde_json::json;
//!
//! let item = OfflineItem::new("comment", json!({"text": "hello"}))
//!     .with_priority(5)
//!     .with_collection("cards");
//!
//! assert!(item.id.is_empty()); // assigned by the store on save
//! assert_eq!(item.status, SyncStatus::Pending);
//! assert_eq!(item.priority, 5);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sync lifecycle of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse the stored representation. Unknown values read as `Pending` so
    /// that a record is never hidden from the next sync run.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic pending record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineItem {
    /// Unique across the whole store. Empty until the store assigns one.
    #[serde(default)]
    pub id: String,
    /// Category tag (e.g. `upload`, `mutation`, `comment`)
    pub category: String,
    /// Opaque JSON payload
    pub payload: Value,
    /// Optional binary attachment (file bytes for uploads)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<Vec<u8>>,
    /// Creation timestamp (epoch millis)
    pub created_at: i64,
    /// Optional grouping label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default)]
    pub status: SyncStatus,
    /// Higher syncs sooner
    #[serde(default)]
    pub priority: i32,
    /// Insertion order, assigned by the store on first save
    #[serde(default)]
    pub seq: u64,
}

impl OfflineItem {
    /// Create a new pending item stamped with the current time.
    pub fn new(category: impl Into<String>, payload: Value) -> Self {
        Self {
            id: String::new(),
            category: category.into(),
            payload,
            blob: None,
            created_at: now_millis(),
            collection: None,
            status: SyncStatus::Pending,
            priority: 0,
            seq: 0,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    #[must_use]
    pub fn with_blob(mut self, blob: Vec<u8>) -> Self {
        self.blob = Some(blob);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Display key `"<category>-<id>"`. Not unique when either part contains `-`.
    #[must_use]
    pub fn key(&self) -> String {
        record_key(&self.category, &self.id)
    }

    /// Assign a fresh UUID if the item has no id yet. Returns the id.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        &self.id
    }

    /// Approximate in-memory size, used for logging batch volume.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.id.len()
            + self.category.len()
            + self.payload.to_string().len()
            + self.blob.as_ref().map_or(0, Vec::len)
            + self.collection.as_ref().map_or(0, String::len)
    }
}

/// Build the display key for a record.
#[must_use]
pub fn record_key(category: &str, id: &str) -> String {
    format!("{}-{}", category, id)
}

/// Current wall-clock time in epoch millis.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Newest-first display order: `created_at` descending, later insertions first on ties.
pub(crate) fn sort_newest_first(items: &mut [OfflineItem]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
}

/// Sync-time order: priority descending, insertion order on ties.
pub(crate) fn sort_for_sync(items: &mut [OfflineItem]) {
    items.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
}
