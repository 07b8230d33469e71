// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite storage backend for the durable local queue.
//!
//! One row per pending record, unique on `(category, id)`. The display key
//! `"<category>-<id>"` is never used for lookups since it is ambiguous when
//! either part contains `-`:
//! ```sql
//! CREATE TABLE offline_items (
//!   seq INTEGER PRIMARY KEY AUTOINCREMENT, -- insertion order
//!   id TEXT NOT NULL,
//!   category TEXT NOT NULL,
//!   payload TEXT NOT NULL,                 -- JSON as text
//!   blob_data BLOB,                        -- binary attachment (uploads)
//!   created_at INTEGER NOT NULL,           -- epoch millis
//!   collection TEXT,
//!   status TEXT NOT NULL DEFAULT 'pending',
//!   priority INTEGER NOT NULL DEFAULT 0,
//!   UNIQUE (category, id)
//! )
//! ```
//!
//! Opening the store retries (a locked or missing directory at startup is
//! usually transient). Individual reads and writes never retry: a fault is
//! reported to the caller as-is.

use async_trait::async_trait;
use sqlx::{AnyPool, Row, any::{AnyPoolOptions, AnyRow}};
use crate::offline_item::{record_key, OfflineItem, SyncStatus};
use super::traits::{LocalStore, StorageError};
use crate::config::SyncConfig;
use crate::resilience::retry::{retry, RetryConfig};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

const SELECT_COLUMNS: &str =
    "SELECT seq, id, category, payload, blob_data, created_at, collection, status, priority FROM offline_items";

pub struct SqlStore {
    pool: AnyPool,
    max_items: Option<u64>,
}

impl SqlStore {
    /// Open (or create) a SQLite store from a connection string such as
    /// `sqlite://queue.db?mode=rwc`.
    pub async fn new(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        // Every pooled connection to an in-memory database is a separate database
        let max_connections = if connection_string.contains(":memory:") { 1 } else { 8 };

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect(connection_string)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool, max_items: None };
        store.enable_wal_mode().await?;
        store.init_schema().await?;
        Ok(store)
    }

    /// Open (or create) a SQLite file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        info!(path = %path_str, "Opening offline store");
        Self::new(&format!("sqlite://{}?mode=rwc", path_str)).await
    }

    /// Open the store described by `config` (path and capacity).
    pub async fn from_config(config: &SyncConfig) -> Result<Self, StorageError> {
        Ok(Self::open(config.store_path_or_default())
            .await?
            .with_max_items(config.store_max_items))
    }

    /// Reject new keys once `max_items` records are stored.
    #[must_use]
    pub fn with_max_items(mut self, max_items: Option<u64>) -> Self {
        self.max_items = max_items;
        self
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    /// Close all pooled connections. Pending writes are already durable.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS offline_items (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                category TEXT NOT NULL,
                payload TEXT NOT NULL,
                blob_data BLOB,
                created_at INTEGER NOT NULL,
                collection TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                priority INTEGER NOT NULL DEFAULT 0,
                UNIQUE (category, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_offline_items_category ON offline_items (category)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn record_exists(&self, category: &str, id: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM offline_items WHERE category = ? AND id = ? LIMIT 1")
            .bind(category)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(row.is_some())
    }

    fn row_to_item(row: &AnyRow) -> Result<OfflineItem, StorageError> {
        let backend = |e: sqlx::Error| StorageError::Backend(e.to_string());

        let id: String = row.try_get("id").map_err(backend)?;
        let category: String = row.try_get("category").map_err(backend)?;
        let payload_json: String = row.try_get("payload").map_err(backend)?;
        let status: String = row.try_get("status").map_err(backend)?;
        let seq: i64 = row.try_get("seq").map_err(backend)?;
        let created_at: i64 = row.try_get("created_at").map_err(backend)?;
        let priority: i64 = row.try_get("priority").map_err(backend)?;
        let collection: Option<String> = row.try_get("collection").map_err(backend)?;
        let blob: Option<Vec<u8>> = row.try_get("blob_data").map_err(backend)?;

        let payload = serde_json::from_str(&payload_json).map_err(|e| StorageError::Serialization {
            key: record_key(&category, &id),
            reason: e.to_string(),
        })?;

        Ok(OfflineItem {
            id,
            category,
            payload,
            blob,
            created_at,
            collection,
            status: SyncStatus::parse(&status),
            priority: priority as i32,
            seq: seq as u64,
        })
    }
}

#[async_trait]
impl LocalStore for SqlStore {
    async fn save(&self, mut item: OfflineItem) -> Result<String, StorageError> {
        item.ensure_id();
        let key = item.key();

        if let Some(max) = self.max_items {
            if !self.record_exists(&item.category, &item.id).await? {
                let count = self.count().await?;
                if count >= max {
                    return Err(StorageError::CapacityExceeded { count, max });
                }
            }
        }

        let payload = serde_json::to_string(&item.payload).map_err(|e| StorageError::Serialization {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        // Upsert keeps the original seq so a rewritten record does not jump the queue
        sqlx::query(
            "INSERT INTO offline_items (id, category, payload, blob_data, created_at, collection, status, priority)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(category, id) DO UPDATE SET
                payload = excluded.payload,
                blob_data = excluded.blob_data,
                created_at = excluded.created_at,
                collection = excluded.collection,
                status = excluded.status,
                priority = excluded.priority",
        )
        .bind(&item.id)
        .bind(&item.category)
        .bind(&payload)
        .bind(&item.blob)
        .bind(item.created_at)
        .bind(&item.collection)
        .bind(item.status.as_str())
        .bind(i64::from(item.priority))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(key = %key, bytes = item.size_bytes(), "Record saved");
        Ok(item.id)
    }

    async fn get(&self, category: &str, id: &str) -> Result<Option<OfflineItem>, StorageError> {
        let sql = format!("{} WHERE category = ? AND id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(category)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn list(&self, category: Option<&str>) -> Result<Vec<OfflineItem>, StorageError> {
        let rows = match category {
            Some(category) => {
                let sql = format!(
                    "{} WHERE category = ? ORDER BY created_at DESC, seq DESC",
                    SELECT_COLUMNS
                );
                sqlx::query(&sql).bind(category).fetch_all(&self.pool).await
            }
            None => {
                let sql = format!("{} ORDER BY created_at DESC, seq DESC", SELECT_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn remove(&self, category: &str, id: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM offline_items WHERE category = ? AND id = ?")
            .bind(category)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM offline_items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let count: i64 = row.try_get("cnt").map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(count as u64)
    }

    async fn count_category(&self, category: &str) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM offline_items WHERE category = ?")
            .bind(category)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let count: i64 = row.try_get("cnt").map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(count as u64)
    }
}
