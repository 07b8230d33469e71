// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicU64, Ordering};
use async_trait::async_trait;
use dashmap::DashMap;
use crate::offline_item::{sort_newest_first, OfflineItem};
use super::traits::{LocalStore, StorageError};

/// Records keyed by `(category, id)`.
pub struct InMemoryStore {
    data: DashMap<(String, String), OfflineItem>,
    next_seq: AtomicU64,
    max_items: Option<u64>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            next_seq: AtomicU64::new(1),
            max_items: None,
        }
    }

    /// Create a store that rejects new keys once `max_items` records are held.
    #[must_use]
    pub fn with_max_items(max_items: u64) -> Self {
        Self {
            max_items: Some(max_items),
            ..Self::new()
        }
    }

    /// Get current item count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear all items
    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn save(&self, mut item: OfflineItem) -> Result<String, StorageError> {
        item.ensure_id();
        let key = (item.category.clone(), item.id.clone());

        // Read guard must be released before insert touches the same shard
        let existing_seq = self.data.get(&key).map(|r| r.value().seq);
        match existing_seq {
            Some(seq) => item.seq = seq,
            None => {
                if let Some(max) = self.max_items {
                    let count = self.data.len() as u64;
                    if count >= max {
                        return Err(StorageError::CapacityExceeded { count, max });
                    }
                }
                item.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            }
        }

        let id = item.id.clone();
        self.data.insert(key, item);
        Ok(id)
    }

    async fn get(&self, category: &str, id: &str) -> Result<Option<OfflineItem>, StorageError> {
        Ok(self.data.get(&(category.to_string(), id.to_string())).map(|r| r.value().clone()))
    }

    async fn list(&self, category: Option<&str>) -> Result<Vec<OfflineItem>, StorageError> {
        let mut items: Vec<OfflineItem> = self
            .data
            .iter()
            .filter(|r| category.map_or(true, |c| r.value().category == c))
            .map(|r| r.value().clone())
            .collect();
        sort_newest_first(&mut items);
        Ok(items)
    }

    async fn remove(&self, category: &str, id: &str) -> Result<(), StorageError> {
        self.data.remove(&(category.to_string(), id.to_string()));
        Ok(())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.data.len() as u64)
    }

    async fn count_category(&self, category: &str) -> Result<u64, StorageError> {
        Ok(self.data.iter().filter(|r| r.value().category == category).count() as u64)
    }
}
