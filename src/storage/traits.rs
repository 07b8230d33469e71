// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use crate::offline_item::OfflineItem;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Store full: {count} items (max {max})")]
    CapacityExceeded {
        count: u64,
        max: u64,
    },
    #[error("Failed to (de)serialize record '{key}': {reason}")]
    Serialization {
        key: String,
        reason: String,
    },
    #[error("Data corruption detected for '{key}': expected hash {expected}, got {actual}")]
    Corruption {
        key: String,
        expected: String,
        actual: String,
    },
}

/// Durable key-addressed storage for pending records.
///
/// Records are addressed by the pair `(category, id)`. Every operation is
/// atomic only with respect to its own record, and faults surface
/// directly to the caller; implementations never retry an operation.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Write a record, assigning an id if it has none. Returns the id.
    ///
    /// Overwriting an existing `(category, id)` keeps the record's original insertion order.
    async fn save(&self, item: OfflineItem) -> Result<String, StorageError>;

    async fn get(&self, category: &str, id: &str) -> Result<Option<OfflineItem>, StorageError>;

    /// All records, optionally filtered by category, newest first.
    async fn list(&self, category: Option<&str>) -> Result<Vec<OfflineItem>, StorageError>;

    /// Delete by `(category, id)`. Deleting a missing record is a no-op.
    async fn remove(&self, category: &str, id: &str) -> Result<(), StorageError>;

    /// Count of all records across every category.
    async fn count(&self) -> Result<u64, StorageError>;

    /// Count of records in one category.
    /// Default implementation lists the category.
    async fn count_category(&self, category: &str) -> Result<u64, StorageError> {
        Ok(self.list(Some(category)).await?.len() as u64)
    }
}
