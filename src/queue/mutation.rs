// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending domain-object mutations.
//!
//! Mutations are listed newest first because they are mostly surfaced for
//! user review. At sync time they are ordinary generic items and follow the
//! priority order.

use std::sync::Arc;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::offline_item::{OfflineItem, SyncStatus};
use crate::storage::traits::{LocalStore, StorageError};

pub const MUTATION_CATEGORY: &str = "mutation";

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub id: String,
    /// Arbitrary domain fields
    pub fields: Map<String, Value>,
    pub pending_sync: bool,
    /// Epoch millis
    pub created_at: i64,
}

impl PendingMutation {
    fn from_item(item: &OfflineItem) -> Result<Self, StorageError> {
        let fields = item
            .payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| StorageError::Serialization {
                key: item.key(),
                reason: "mutation payload has no 'fields' object".to_string(),
            })?;

        Ok(Self {
            id: item.id.clone(),
            fields,
            pending_sync: item.status == SyncStatus::Pending,
            created_at: item.created_at,
        })
    }
}

#[derive(Clone)]
pub struct MutationQueue {
    store: Arc<dyn LocalStore>,
}

impl MutationQueue {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Queue a domain edit. An `id` field, when present, becomes the record id.
    pub async fn save_mutation(&self, fields: Map<String, Value>) -> Result<String, StorageError> {
        self.save_mutation_with_priority(fields, 0).await
    }

    /// Queue a domain edit that should sync ahead of lower-priority items.
    pub async fn save_mutation_with_priority(
        &self,
        fields: Map<String, Value>,
        priority: i32,
    ) -> Result<String, StorageError> {
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default();

        let item = OfflineItem::new(MUTATION_CATEGORY, json!({ "fields": fields }))
            .with_id(id)
            .with_priority(priority);

        let id = self.store.save(item).await?;
        debug!(id = %id, priority, "Mutation queued");
        Ok(id)
    }

    /// All pending mutations, newest first.
    pub async fn pending_mutations(&self) -> Result<Vec<PendingMutation>, StorageError> {
        self.store
            .list(Some(MUTATION_CATEGORY))
            .await?
            .iter()
            .map(PendingMutation::from_item)
            .collect()
    }

    pub async fn remove_mutation(&self, id: &str) -> Result<(), StorageError> {
        self.store.remove(MUTATION_CATEGORY, id).await
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        self.store.count_category(MUTATION_CATEGORY).await
    }
}
