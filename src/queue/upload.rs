// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending file uploads.
//!
//! Each upload is stored as an [`OfflineItem`] in the `upload` category:
//! the file bytes go in the record's blob, everything else in its JSON
//! payload together with a SHA-256 of the bytes. Reading back a record whose
//! bytes no longer match the hash fails with [`StorageError::Corruption`].

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::offline_item::{now_millis, OfflineItem};
use crate::storage::traits::{LocalStore, StorageError};

pub const UPLOAD_CATEGORY: &str = "upload";

/// Binary file handle awaiting upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub id: String,
    pub file: UploadFile,
    /// Entity that owns the file once uploaded (card, gallery, ...)
    pub entity_id: String,
    pub user_id: String,
    pub metadata: Map<String, Value>,
    /// Epoch millis
    pub created_at: i64,
    pub is_private: bool,
}

/// JSON half of a stored upload.
#[derive(Debug, Serialize, Deserialize)]
struct UploadPayload {
    file_name: String,
    content_type: String,
    content_hash: String,
    entity_id: String,
    user_id: String,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default)]
    is_private: bool,
}

fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

impl PendingUpload {
    /// Rebuild an upload from its stored record, verifying the file bytes.
    pub fn from_item(item: &OfflineItem) -> Result<Self, StorageError> {
        let payload: UploadPayload = serde_json::from_value(item.payload.clone())
            .map_err(|e| StorageError::Serialization {
                key: item.key(),
                reason: e.to_string(),
            })?;

        let bytes = item.blob.clone().unwrap_or_default();
        let actual = content_hash(&bytes);
        if actual != payload.content_hash {
            crate::metrics::record_corruption(UPLOAD_CATEGORY);
            return Err(StorageError::Corruption {
                key: item.key(),
                expected: payload.content_hash,
                actual,
            });
        }

        Ok(Self {
            id: item.id.clone(),
            file: UploadFile {
                name: payload.file_name,
                content_type: payload.content_type,
                bytes,
            },
            entity_id: payload.entity_id,
            user_id: payload.user_id,
            metadata: payload.metadata,
            created_at: item.created_at,
            is_private: payload.is_private,
        })
    }

    /// Convert into a storable record.
    pub fn into_item(self) -> Result<OfflineItem, StorageError> {
        let payload = UploadPayload {
            content_hash: content_hash(&self.file.bytes),
            file_name: self.file.name,
            content_type: self.file.content_type,
            entity_id: self.entity_id,
            user_id: self.user_id,
            metadata: self.metadata,
            is_private: self.is_private,
        };
        let payload = serde_json::to_value(payload).map_err(|e| StorageError::Serialization {
            key: crate::offline_item::record_key(UPLOAD_CATEGORY, &self.id),
            reason: e.to_string(),
        })?;

        Ok(OfflineItem::new(UPLOAD_CATEGORY, payload)
            .with_id(self.id)
            .with_blob(self.file.bytes)
            .with_created_at(self.created_at))
    }
}

/// Queue of files waiting to be uploaded.
#[derive(Clone)]
pub struct UploadQueue {
    store: Arc<dyn LocalStore>,
}

impl UploadQueue {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Queue a file for upload. The returned id lets the caller correlate a
    /// pending visual state with this exact queued item.
    pub async fn save_for_offline_upload(
        &self,
        file: UploadFile,
        entity_id: &str,
        user_id: &str,
        metadata: Map<String, Value>,
        is_private: bool,
    ) -> Result<String, StorageError> {
        let size = file.bytes.len();
        let upload = PendingUpload {
            id: uuid::Uuid::new_v4().to_string(),
            file,
            entity_id: entity_id.to_string(),
            user_id: user_id.to_string(),
            metadata,
            created_at: now_millis(),
            is_private,
        };

        let id = self.store.save(upload.into_item()?).await?;
        info!(id = %id, entity_id, bytes = size, "Upload queued for offline sync");
        Ok(id)
    }

    /// All pending uploads, oldest first.
    pub async fn pending_uploads(&self) -> Result<Vec<PendingUpload>, StorageError> {
        self.pending_upload_items()
            .await?
            .iter()
            .map(PendingUpload::from_item)
            .collect()
    }

    /// Raw upload records, oldest first. The orchestrator decodes them one by
    /// one so a single corrupted record does not block the rest.
    pub(crate) async fn pending_upload_items(&self) -> Result<Vec<OfflineItem>, StorageError> {
        let mut items = self.store.list(Some(UPLOAD_CATEGORY)).await?;
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));
        Ok(items)
    }

    pub async fn remove_pending_upload(&self, id: &str) -> Result<(), StorageError> {
        self.store.remove(UPLOAD_CATEGORY, id).await?;
        debug!(id, "Pending upload removed");
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        self.store.count_category(UPLOAD_CATEGORY).await
    }
}
