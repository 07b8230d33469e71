// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offline queue walkthrough.
//!
//! Demonstrates:
//! 1. Opening a SQLite-backed queue in a temp directory
//! 2. Queueing uploads and mutations while "offline"
//! 3. Going online, which lets the connectivity monitor trigger a sync
//! 4. One item rejected by the remote and left queued
//! 5. Displaying stats and captured metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example offline_queue
//! ```

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::{json, Map};
use tokio::sync::watch;

use offline_sync::{
    ConflictStrategy, ConnectivityMonitor, OfflineItem, PendingUpload, RemoteError, RemoteSync,
    SqlStore, SyncConfig, SyncOrchestrator, UploadFile,
};

/// Pretend server: slow-ish, and refuses mutations with an empty title.
struct DemoRemote;

#[async_trait]
impl RemoteSync for DemoRemote {
    async fn push_item(&self, item: &OfflineItem, strategy: ConflictStrategy) -> Result<(), RemoteError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let title = item.payload.pointer("/fields/title").and_then(|v| v.as_str());
        if title == Some("") {
            return Err(RemoteError::Rejected("title must not be empty".into()));
        }
        println!("   └─ pushed {} ({}, priority {}, {})", item.key(), item.category, item.priority, strategy);
        Ok(())
    }

    async fn upload(&self, upload: &PendingUpload, _strategy: ConflictStrategy) -> Result<(), RemoteError> {
        tokio::time::sleep(Duration::from_millis(40)).await;
        println!(
            "   └─ uploaded {} ({} bytes) for {}",
            upload.file.name,
            upload.file.bytes.len(),
            upload.entity_id
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_sync=info".into()),
        )
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           offline-sync: Offline Queue Example                 ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Open the queue
    // ─────────────────────────────────────────────────────────────────────────
    let dir = tempfile::tempdir()?;
    let config = SyncConfig {
        store_path: Some(dir.path().join("queue.db").to_string_lossy().into_owned()),
        batch_size: 2,
        auto_sync_interval_secs: 0,
        ..Default::default()
    };
    let store = Arc::new(SqlStore::from_config(&config).await?);
    let orchestrator = Arc::new(SyncOrchestrator::new(config, store, Arc::new(DemoRemote)));
    println!("📦 Queue opened, state: {}", orchestrator.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Queue work while offline
    // ─────────────────────────────────────────────────────────────────────────
    let (online_tx, online_rx) = watch::channel(false);
    let monitor = ConnectivityMonitor::from_config(orchestrator.clone(), online_rx);

    println!("\n📝 Offline: queueing work...");
    for (name, bytes) in [("cover.png", 2048), ("scan.pdf", 8192)] {
        let id = orchestrator
            .uploads()
            .save_for_offline_upload(
                UploadFile::new(name, "application/octet-stream", vec![0xAB; bytes]),
                "card-42",
                "user-7",
                Map::new(),
                false,
            )
            .await?;
        println!("   └─ upload queued: {} → {}", name, id);
    }

    let mutations = [
        (json!({"id": "card-42", "title": "Quarterly plan"}), 5),
        (json!({"id": "card-43", "title": ""}), 0),
        (json!({"id": "card-44", "title": "Retro notes"}), 1),
    ];
    for (fields, priority) in mutations {
        let fields = fields.as_object().cloned().unwrap_or_default();
        let id = orchestrator.mutations().save_mutation_with_priority(fields, priority).await?;
        println!("   └─ mutation queued: {} (priority {})", id, priority);
    }

    let stats = orchestrator.refresh_stats().await?;
    println!("   ⏳ Pending: {}", stats.pending);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Come back online
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🌐 Online again, monitor triggers a sync...");
    let mut stats_rx = orchestrator.subscribe();
    online_tx.send(true)?;
    tokio::time::timeout(Duration::from_secs(5), async {
        while stats_rx.borrow_and_update().last_sync_at.is_none() {
            if stats_rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await?;

    // ─────────────────────────────────────────────────────────────────────────
    // 4. What is left
    // ─────────────────────────────────────────────────────────────────────────
    let stats = orchestrator.stats();
    println!("\n📊 Stats after run ({}):", orchestrator.state());
    println!("   ┌─ synced:    {}", stats.synced);
    println!("   ├─ failed:    {}", stats.failed);
    println!("   ├─ conflicts: {}", stats.conflicts);
    println!("   └─ pending:   {}", stats.pending);

    for mutation in orchestrator.mutations().pending_mutations().await? {
        println!("   ⚠️  still queued: mutation {} {:?}", mutation.id, mutation.fields);
    }

    monitor.shutdown().await;

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    Ok(())
}

/// Print captured metrics, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => format!("{}", v),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}", samples.len(), sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }

    lines.sort();
    for line in &lines {
        println!("   └─ {}", line);
    }
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
