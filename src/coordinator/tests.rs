// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map};
use tokio::sync::{Notify, Semaphore};

use super::*;
use crate::offline_item::OfflineItem;
use crate::queue::upload::{PendingUpload, UploadFile};
use crate::remote::{ConflictStrategy, RemoteError, RemoteSync};
use crate::storage::memory::InMemoryStore;

type CallHook = Box<dyn Fn(usize) + Send + Sync>;

/// Remote that records every call and fails the ids it is told to.
#[derive(Default)]
struct ScriptedRemote {
    calls: Mutex<Vec<String>>,
    strategies: Mutex<Vec<ConflictStrategy>>,
    fail_ids: HashSet<String>,
    conflict_ids: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    entered: Notify,
    on_call: Option<CallHook>,
}

impl ScriptedRemote {
    fn failing(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn handle(&self, id: &str, strategy: ConflictStrategy) -> Result<(), RemoteError> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(id.to_string());
            calls.len()
        };
        self.strategies.lock().push(strategy);
        self.entered.notify_one();
        if let Some(ref hook) = self.on_call {
            hook(n);
        }
        if let Some(ref gate) = self.gate {
            gate.acquire().await.unwrap().forget();
        }
        tokio::task::yield_now().await;

        if self.conflict_ids.contains(id) {
            return Err(RemoteError::Conflict(format!("{} changed on server", id)));
        }
        if self.fail_ids.contains(id) {
            return Err(RemoteError::Rejected(format!("{} is invalid", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSync for ScriptedRemote {
    async fn push_item(&self, item: &OfflineItem, strategy: ConflictStrategy) -> Result<(), RemoteError> {
        self.handle(&item.id, strategy).await
    }

    async fn upload(&self, upload: &PendingUpload, strategy: ConflictStrategy) -> Result<(), RemoteError> {
        self.handle(&upload.id, strategy).await
    }
}

/// Store whose list or remove can be made to fail, or list held back.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    fail_list: bool,
    fail_remove: bool,
    list_gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl LocalStore for FlakyStore {
    async fn save(&self, item: OfflineItem) -> Result<String, StorageError> {
        self.inner.save(item).await
    }

    async fn get(&self, category: &str, id: &str) -> Result<Option<OfflineItem>, StorageError> {
        self.inner.get(category, id).await
    }

    async fn list(&self, category: Option<&str>) -> Result<Vec<OfflineItem>, StorageError> {
        if let Some(ref gate) = self.list_gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail_list {
            return Err(StorageError::Backend("disk I/O error".into()));
        }
        self.inner.list(category).await
    }

    async fn remove(&self, category: &str, id: &str) -> Result<(), StorageError> {
        if self.fail_remove {
            return Err(StorageError::Backend("database is locked".into()));
        }
        self.inner.remove(category, id).await
    }

    async fn count(&self) -> Result<u64, StorageError> {
        self.inner.count().await
    }
}

fn orchestrator(store: Arc<dyn LocalStore>, remote: Arc<ScriptedRemote>) -> SyncOrchestrator {
    SyncOrchestrator::new(SyncConfig::default(), store, remote)
}

async fn seed(store: &dyn LocalStore, ids: &[&str]) {
    for id in ids {
        store
            .save(OfflineItem::new("comment", json!({"text": id})).with_id(*id))
            .await
            .unwrap();
    }
}

async fn remaining_ids(store: &dyn LocalStore) -> Vec<String> {
    let mut ids: Vec<String> = store.list(None).await.unwrap().into_iter().map(|i| i.id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_empty_store_completes() {
    let store = Arc::new(InMemoryStore::new());
    let remote = Arc::new(ScriptedRemote::default());
    let orch = orchestrator(store, remote.clone());

    let report = orch.sync(SyncOptions::default()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.total, 0);
    assert_eq!(report.synced, 0);
    assert!(report.is_success());
    assert_eq!(orch.state(), RunState::Completed);
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_higher_priority_synced_first() {
    let store = Arc::new(InMemoryStore::new());
    for (id, priority) in [("p1", 1), ("p5", 5), ("p3", 3)] {
        store
            .save(OfflineItem::new("comment", json!({})).with_id(id).with_priority(priority))
            .await
            .unwrap();
    }
    let remote = Arc::new(ScriptedRemote::default());
    let orch = orchestrator(store, remote.clone());

    orch.sync(SyncOptions::default().with_batch_size(1)).await.unwrap();

    assert_eq!(remote.calls(), vec!["p5", "p3", "p1"]);
}

#[tokio::test]
async fn test_equal_priority_keeps_insertion_order() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["a", "b", "c", "d"]).await;
    let remote = Arc::new(ScriptedRemote::default());
    let orch = orchestrator(store, remote.clone());

    orch.sync(SyncOptions::default().with_batch_size(1)).await.unwrap();

    assert_eq!(remote.calls(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["only"]).await;
    let gate = Arc::new(Semaphore::new(0));
    let remote = Arc::new(ScriptedRemote {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let orch = Arc::new(orchestrator(store.clone(), remote.clone()));
    let mut state_rx = orch.state_receiver();

    let first = tokio::spawn({
        let orch = orch.clone();
        async move { orch.sync(SyncOptions::default()).await }
    });

    remote.entered.notified().await;
    assert!(orch.is_syncing());
    assert!(orch.status().is_syncing);
    assert_eq!(*state_rx.borrow_and_update(), RunState::Running);

    let second = orch.sync(SyncOptions::default()).await.unwrap();
    assert_eq!(second.outcome, RunOutcome::Rejected);
    assert_eq!(second.synced, 0);
    assert_eq!(remote.calls().len(), 1);

    gate.add_permits(1);
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(remote.calls().len(), 1);
    assert!(!orch.is_syncing());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_continue_on_error_keeps_failed_item() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["1", "2", "3"]).await;
    let remote = Arc::new(ScriptedRemote::failing(&["2"]));
    let orch = orchestrator(store.clone(), remote.clone());

    let report = orch
        .sync(SyncOptions::default().with_continue_on_error(true))
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.synced, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.total, 3);
    assert!(!report.is_success());
    assert_eq!(remaining_ids(store.as_ref()).await, vec!["2"]);

    let stats = orch.stats();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_fail_fast_aborts_and_keeps_earlier_removals() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["1", "2", "3"]).await;
    let remote = Arc::new(ScriptedRemote::failing(&["2"]));
    let orch = orchestrator(store.clone(), remote.clone());

    let err = orch
        .sync(SyncOptions::fail_fast().with_batch_size(1))
        .await
        .unwrap_err();

    match err {
        SyncError::Aborted { synced, source } => {
            assert_eq!(synced, 1);
            assert_eq!(source.key(), "comment-2");
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(remaining_ids(store.as_ref()).await, vec!["2", "3"]);
    assert_eq!(remote.calls(), vec!["1", "2"]);
    assert_eq!(orch.state(), RunState::Aborted);
    assert!(!orch.is_syncing());
}

#[tokio::test]
async fn test_cancel_stops_before_next_batch() {
    let store = Arc::new(InMemoryStore::new());
    let ids: Vec<String> = (0..10).map(|i| format!("item-{:02}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    seed(store.as_ref(), &id_refs).await;

    // Cancel as soon as the first item of batch 2 reaches the remote
    let slot: Arc<OnceLock<Arc<SyncOrchestrator>>> = Arc::new(OnceLock::new());
    let hook_slot = slot.clone();
    let remote = Arc::new(ScriptedRemote {
        on_call: Some(Box::new(move |n| {
            if n == 3 {
                if let Some(orch) = hook_slot.get() {
                    orch.cancel();
                }
            }
        })),
        ..Default::default()
    });
    let orch = Arc::new(orchestrator(store.clone(), remote.clone()));
    let _ = slot.set(orch.clone());

    let report = orch.sync(SyncOptions::default().with_batch_size(2)).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.synced, 4);
    assert_eq!(report.total, 10);
    assert_eq!(remote.calls().len(), 4);
    assert_eq!(store.len(), 6);
    assert_eq!(orch.state(), RunState::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_as_soon_as_syncing_is_honoured() {
    let gate = Arc::new(Semaphore::new(0));
    let store = Arc::new(FlakyStore {
        list_gate: Some(gate.clone()),
        ..Default::default()
    });
    seed(store.as_ref(), &["a", "b"]).await;
    let remote = Arc::new(ScriptedRemote::default());
    let orch = Arc::new(orchestrator(store.clone(), remote.clone()));

    let run = tokio::spawn({
        let orch = orch.clone();
        async move { orch.sync(SyncOptions::default()).await }
    });

    while !orch.is_syncing() {
        std::hint::spin_loop();
    }
    orch.cancel();
    gate.add_permits(10);

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert_eq!(report.synced, 0);
    assert!(remote.calls().is_empty());
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_cancel_without_run_is_noop() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["x"]).await;
    let orch = orchestrator(store.clone(), Arc::new(ScriptedRemote::default()));

    orch.cancel();
    let report = orch.sync(SyncOptions::default()).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.synced, 1);
}

#[tokio::test]
async fn test_items_before_uploads_and_uploads_oldest_first() {
    let store = Arc::new(InMemoryStore::new());
    for (id, created_at) in [("up-new", 300), ("up-old", 100)] {
        let upload = PendingUpload {
            id: id.into(),
            file: UploadFile::new("f.png", "image/png", vec![1]),
            entity_id: "card".into(),
            user_id: "user".into(),
            metadata: Map::new(),
            created_at,
            is_private: false,
        };
        store.save(upload.into_item().unwrap()).await.unwrap();
    }
    store
        .save(OfflineItem::new("mutation", json!({"fields": {}})).with_id("m-1"))
        .await
        .unwrap();
    let remote = Arc::new(ScriptedRemote::default());
    let orch = orchestrator(store.clone(), remote.clone());

    let report = orch.sync(SyncOptions::default().with_batch_size(1)).await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.synced, 3);
    assert_eq!(remote.calls(), vec!["m-1", "up-old", "up-new"]);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_unreadable_upload_counted_in_total() {
    let store = Arc::new(InMemoryStore::new());
    let upload = PendingUpload {
        id: "broken".into(),
        file: UploadFile::new("f.png", "image/png", vec![1, 2, 3]),
        entity_id: "card".into(),
        user_id: "user".into(),
        metadata: Map::new(),
        created_at: 1,
        is_private: false,
    };
    let mut item = upload.into_item().unwrap();
    item.blob = Some(vec![9, 9, 9]);
    store.save(item).await.unwrap();
    seed(store.as_ref(), &["fine"]).await;
    let remote = Arc::new(ScriptedRemote::default());
    let orch = orchestrator(store.clone(), remote.clone());

    let report = orch.sync(SyncOptions::default()).await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.synced, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.synced + report.failed, report.total);
    assert_eq!(remote.calls(), vec!["fine"]);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_progress_reports_each_item() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["a", "b", "c"]).await;
    let orch = orchestrator(store, Arc::new(ScriptedRemote::default()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    orch.sync(
        SyncOptions::default()
            .with_batch_size(1)
            .with_progress(move |synced, total| sink.lock().push((synced, total))),
    )
    .await
    .unwrap();

    assert_eq!(*seen.lock(), vec![(1, 3), (2, 3), (3, 3)]);
}

#[tokio::test]
async fn test_strategy_forwarded_to_remote() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["a", "b"]).await;
    let remote = Arc::new(ScriptedRemote::default());
    let orch = orchestrator(store, remote.clone());

    orch.sync(SyncOptions::default().with_strategy(ConflictStrategy::Merge))
        .await
        .unwrap();

    assert_eq!(*remote.strategies.lock(), vec![ConflictStrategy::Merge; 2]);
}

#[tokio::test]
async fn test_conflicts_counted_in_stats() {
    let store = Arc::new(InMemoryStore::new());
    seed(store.as_ref(), &["ok", "clash"]).await;
    let remote = Arc::new(ScriptedRemote {
        conflict_ids: ["clash".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let orch = orchestrator(store, remote);
    let mut stats_rx = orch.subscribe();

    let report = orch.sync(SyncOptions::default()).await.unwrap();
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.failed, 1);

    assert!(stats_rx.has_changed().unwrap());
    let stats = stats_rx.borrow_and_update().clone();
    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.synced, 1);
    assert_eq!(stats.pending, 1);
    assert!(stats.last_sync_at.is_some());
}

#[tokio::test]
async fn test_synced_stat_is_cumulative() {
    let store = Arc::new(InMemoryStore::new());
    let orch = orchestrator(store.clone(), Arc::new(ScriptedRemote::default()));

    seed(store.as_ref(), &["a", "b"]).await;
    orch.trigger_sync().await.unwrap();
    seed(store.as_ref(), &["c"]).await;
    orch.trigger_sync().await.unwrap();

    let stats = orch.stats();
    assert_eq!(stats.synced, 3);
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_refresh_stats_counts_pending() {
    let store = Arc::new(InMemoryStore::new());
    let orch = orchestrator(store.clone(), Arc::new(ScriptedRemote::default()));
    assert_eq!(orch.stats(), SyncStats::default());

    seed(store.as_ref(), &["a", "b"]).await;
    let stats = orch.refresh_stats().await.unwrap();
    assert_eq!(stats.pending, 2);
    assert!(stats.last_sync_at.is_none());
}

#[tokio::test]
async fn test_enumeration_fault_aborts_run() {
    let store = Arc::new(FlakyStore {
        fail_list: true,
        ..Default::default()
    });
    let remote = Arc::new(ScriptedRemote::default());
    let orch = orchestrator(store, remote.clone());

    let err = orch.sync(SyncOptions::default()).await.unwrap_err();

    assert!(matches!(err, SyncError::Storage(StorageError::Backend(_))));
    assert_eq!(orch.state(), RunState::Aborted);
    assert!(!orch.is_syncing());
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn test_remove_fault_counts_as_item_failure() {
    let store = Arc::new(FlakyStore {
        fail_remove: true,
        ..Default::default()
    });
    seed(store.as_ref(), &["a"]).await;
    let orch = orchestrator(store.clone(), Arc::new(ScriptedRemote::default()));

    let report = orch.sync(SyncOptions::default()).await.unwrap();

    assert_eq!(report.synced, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_queues_share_the_store() {
    let store = Arc::new(InMemoryStore::new());
    let orch = orchestrator(store.clone(), Arc::new(ScriptedRemote::default()));

    orch.uploads()
        .save_for_offline_upload(UploadFile::new("a.png", "image/png", vec![7]), "card", "user", Map::new(), false)
        .await
        .unwrap();
    orch.mutations()
        .save_mutation(json!({"title": "x"}).as_object().cloned().unwrap())
        .await
        .unwrap();

    assert_eq!(store.len(), 2);
    let report = orch.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 2);
    assert!(store.is_empty());
}

#[test]
fn test_online_flag() {
    let orch = orchestrator(Arc::new(InMemoryStore::new()), Arc::new(ScriptedRemote::default()));
    assert!(orch.is_online());

    orch.set_online(false);
    assert_eq!(
        orch.status(),
        SyncActivity { is_syncing: false, is_online: false }
    );
}
