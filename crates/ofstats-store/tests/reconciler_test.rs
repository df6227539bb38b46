// Integration tests for the reconciler's per-key write ordering
//
// Uses a store that records every call and can stall or fail selected writes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ofstats_core::{DeviceCategoryKey, DeviceId, LogicalRecord, StatCategory, TableRecord};
use ofstats_store::{MemoryStore, Reconciler, StatsStore, StoreError};
use parking_lot::Mutex;

/// Table id that makes an upsert fail
const POISON: u8 = 255;

#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<String>>,
    purge_delay: Duration,
}

impl RecordingStore {
    fn with_purge_delay(purge_delay: Duration) -> Self {
        Self {
            purge_delay,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StatsStore for RecordingStore {
    async fn delete_range(&self, key: &DeviceCategoryKey) -> ofstats_store::Result<usize> {
        tokio::time::sleep(self.purge_delay).await;
        self.calls.lock().push(format!("purge {}", key.category));
        self.inner.delete_range(key).await
    }

    async fn upsert(
        &self,
        key: &DeviceCategoryKey,
        records: &[LogicalRecord],
    ) -> ofstats_store::Result<usize> {
        let ids: Vec<String> = records
            .iter()
            .map(|record| match record {
                LogicalRecord::Table(table) => table.table_id.to_string(),
                _ => "?".to_string(),
            })
            .collect();
        self.calls
            .lock()
            .push(format!("merge {} [{}]", key.category, ids.join(",")));

        if records
            .iter()
            .any(|record| matches!(record, LogicalRecord::Table(t) if t.table_id == POISON))
        {
            return Err(StoreError::backend("upsert", key, "poisoned record"));
        }
        self.inner.upsert(key, records).await
    }

    async fn read(&self, key: &DeviceCategoryKey) -> ofstats_store::Result<Vec<LogicalRecord>> {
        self.inner.read(key).await
    }
}

fn key(category: StatCategory) -> DeviceCategoryKey {
    DeviceCategoryKey::new(DeviceId::new(1), category)
}

fn table(table_id: u8) -> LogicalRecord {
    LogicalRecord::Table(TableRecord {
        table_id,
        active_count: 1,
        lookup_count: 0,
        matched_count: 0,
    })
}

#[tokio::test(start_paused = true)]
async fn merges_wait_for_a_slow_purge() {
    let store = Arc::new(RecordingStore::with_purge_delay(Duration::from_millis(50)));
    let reconciler = Reconciler::new(store.clone());
    let tables = key(StatCategory::Table);

    let purge = reconciler.purge_stale(tables);
    let first = reconciler.merge(tables, vec![table(1)]);
    let second = reconciler.merge(tables, vec![table(2)]);

    second.await.unwrap();
    assert!(purge.peek().is_some());
    assert!(first.peek().is_some());
    assert_eq!(
        store.calls(),
        vec!["purge table", "merge table [1]", "merge table [2]"]
    );
}

#[tokio::test(start_paused = true)]
async fn keys_do_not_wait_on_each_other() {
    let store = Arc::new(RecordingStore::with_purge_delay(Duration::from_millis(50)));
    let reconciler = Reconciler::new(store.clone());

    let slow = reconciler.purge_stale(key(StatCategory::Table));
    let fast = reconciler.merge(key(StatCategory::Port), vec![table(9)]);

    fast.await.unwrap();
    assert!(slow.peek().is_none());
    slow.await.unwrap();
    assert_eq!(store.calls(), vec!["merge port [9]", "purge table"]);
}

#[tokio::test]
async fn merge_after_failed_merge_is_not_applied() {
    let store = Arc::new(RecordingStore::default());
    let reconciler = Reconciler::new(store.clone());
    let tables = key(StatCategory::Table);

    let bad = reconciler.merge(tables, vec![table(POISON)]);
    let after = reconciler.merge(tables, vec![table(3)]);

    assert!(matches!(bad.await, Err(StoreError::Backend { .. })));
    let err = after.await.unwrap_err();
    assert_eq!(err.code(), "S003");
    assert_eq!(store.calls(), vec!["merge table [255]"]);
    assert!(reconciler.read_settled(&tables).await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_starts_a_new_cycle_after_a_failure() {
    let store = Arc::new(RecordingStore::default());
    let reconciler = Reconciler::new(store.clone());
    let tables = key(StatCategory::Table);

    let bad = reconciler.merge(tables, vec![table(POISON)]);
    let purge = reconciler.purge_stale(tables);
    let merge = reconciler.merge(tables, vec![table(4)]);

    assert!(bad.await.is_err());
    assert_eq!(purge.await.unwrap(), 0);
    assert_eq!(merge.await.unwrap(), 1);
    assert_eq!(
        reconciler.read_settled(&tables).await.unwrap(),
        vec![table(4)]
    );
}
