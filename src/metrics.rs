// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the offline queue.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `offline_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: item, upload
//! - `status`: synced, timeout, rejected, conflict, unavailable, other, remove_failed
//! - `outcome`: completed, cancelled, aborted, rejected

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the result of one item attempt
pub fn record_item(kind: &str, status: &str) {
    counter!(
        "offline_sync_items_total",
        "kind" => kind.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the remote round trip plus local removal of one synced item
pub fn record_item_latency(kind: &str, duration: Duration) {
    histogram!(
        "offline_sync_item_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a finished (or rejected) sync run
pub fn record_run(outcome: &str, duration: Duration) {
    counter!(
        "offline_sync_runs_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("offline_sync_run_seconds").record(duration.as_secs_f64());
}

/// Record how many items were dispatched together
pub fn record_batch_size(count: usize) {
    histogram!("offline_sync_batch_size").record(count as f64);
}

/// Set the number of records waiting in the local store
pub fn set_pending_items(count: u64) {
    gauge!("offline_sync_pending_items").set(count as f64);
}

/// Set connectivity (1 = online, 0 = offline)
pub fn set_online(online: bool) {
    gauge!("offline_sync_online").set(if online { 1.0 } else { 0.0 });
}

/// Record a stored record whose content no longer matches its hash
pub fn record_corruption(category: &str) {
    counter!(
        "offline_sync_corruption_detected_total",
        "category" => category.to_string()
    )
    .increment(1);
}
