use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use ofstats_core::{DeviceCategoryKey, LogicalRecord};
use parking_lot::Mutex;

use crate::error::Result;

/// Keyed cache of logical records.
///
/// Ordering across calls is provided by [`crate::Reconciler`], not by the
/// store. [`MemoryStore`] applies each call atomically; backends that write
/// one object per record may leave part of a failed `upsert` applied, which
/// the failing call reports and the next purge clears.
#[async_trait]
pub trait StatsStore: Send + Sync + 'static {
    /// Remove every record cached under `key`, returning how many were removed.
    async fn delete_range(&self, key: &DeviceCategoryKey) -> Result<usize>;

    /// Insert or replace `records` by record key, returning how many were written.
    async fn upsert(&self, key: &DeviceCategoryKey, records: &[LogicalRecord]) -> Result<usize>;

    /// Every record cached under `key`, ordered by record key.
    async fn read(&self, key: &DeviceCategoryKey) -> Result<Vec<LogicalRecord>>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<DeviceCategoryKey, BTreeMap<String, LogicalRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn delete_range(&self, key: &DeviceCategoryKey) -> Result<usize> {
        Ok(self
            .entries
            .lock()
            .remove(key)
            .map_or(0, |records| records.len()))
    }

    async fn upsert(&self, key: &DeviceCategoryKey, records: &[LogicalRecord]) -> Result<usize> {
        let mut entries = self.entries.lock();
        let cached = entries.entry(*key).or_default();
        for record in records {
            cached.insert(record.record_key(), record.clone());
        }
        Ok(records.len())
    }

    async fn read(&self, key: &DeviceCategoryKey) -> Result<Vec<LogicalRecord>> {
        Ok(self
            .entries
            .lock()
            .get(key)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofstats_core::{DeviceId, StatCategory, TableRecord};

    fn table(table_id: u8, active_count: u32) -> LogicalRecord {
        LogicalRecord::Table(TableRecord {
            table_id,
            active_count,
            lookup_count: 0,
            matched_count: 0,
        })
    }

    #[tokio::test]
    async fn upsert_replaces_by_record_key() {
        let store = MemoryStore::new();
        let key = DeviceCategoryKey::new(DeviceId::new(1), StatCategory::Table);

        store.upsert(&key, &[table(0, 1), table(1, 1)]).await.unwrap();
        store.upsert(&key, &[table(0, 9)]).await.unwrap();

        let records = store.read(&key).await.unwrap();
        assert_eq!(records, vec![table(0, 9), table(1, 1)]);
    }

    #[tokio::test]
    async fn delete_range_is_scoped_to_its_key() {
        let store = MemoryStore::new();
        let tables = DeviceCategoryKey::new(DeviceId::new(1), StatCategory::Table);
        let other_device = DeviceCategoryKey::new(DeviceId::new(2), StatCategory::Table);

        store.upsert(&tables, &[table(0, 1)]).await.unwrap();
        store.upsert(&other_device, &[table(0, 1)]).await.unwrap();

        assert_eq!(store.delete_range(&tables).await.unwrap(), 1);
        assert!(store.read(&tables).await.unwrap().is_empty());
        assert_eq!(store.read(&other_device).await.unwrap().len(), 1);
    }
}
