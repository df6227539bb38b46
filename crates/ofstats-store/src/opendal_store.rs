// OpenDAL-backed statistics store
//
// One JSON object per record at `<device>/<category>/<hash>.json`, where the
// hash is the blake3 digest of the record key. Works on any operator; the
// collector wires the filesystem service.

use async_trait::async_trait;
use ofstats_core::{DeviceCategoryKey, LogicalRecord};
use opendal::{ErrorKind, Operator};

use crate::error::{Result, StoreError};
use crate::store::StatsStore;

#[derive(Clone, Debug)]
pub struct OpendalStore {
    operator: Operator,
}

impl OpendalStore {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// Store rooted at a local directory
    pub fn new_fs(root: &str) -> Result<Self> {
        let builder = opendal::services::Fs::default().root(root);
        let operator = Operator::new(builder)
            .map_err(|e| {
                StoreError::invalid_config(format!("Failed to create filesystem operator: {e}"))
            })?
            .finish();
        Ok(Self { operator })
    }

    fn prefix(key: &DeviceCategoryKey) -> String {
        format!("{}/{}/", key.device, key.category)
    }

    fn record_path(key: &DeviceCategoryKey, record: &LogicalRecord) -> String {
        let digest = blake3::hash(record.record_key().as_bytes());
        format!("{}{}.json", Self::prefix(key), digest.to_hex())
    }

    async fn record_paths(&self, key: &DeviceCategoryKey) -> Result<Vec<String>> {
        let entries = match self
            .operator
            .list_with(&Self::prefix(key))
            .recursive(true)
            .await
        {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::backend("list", key, e)),
        };

        let mut paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file() && entry.path().ends_with(".json"))
            .map(|entry| entry.path().to_string())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl StatsStore for OpendalStore {
    async fn delete_range(&self, key: &DeviceCategoryKey) -> Result<usize> {
        let removed = self.record_paths(key).await?.len();
        if removed > 0 {
            self.operator
                .remove_all(&Self::prefix(key))
                .await
                .map_err(|e| StoreError::backend("delete_range", key, e))?;
        }
        Ok(removed)
    }

    /// Every record is serialized before the first object is written, so a
    /// record that cannot be encoded leaves the key untouched. Objects are then
    /// written one at a time: a backend failure partway through keeps the
    /// records already written and reports the whole call as failed. The next
    /// cycle's purge removes them.
    async fn upsert(&self, key: &DeviceCategoryKey, records: &[LogicalRecord]) -> Result<usize> {
        let objects = records
            .iter()
            .map(|record| {
                let path = Self::record_path(key, record);
                serde_json::to_vec(record)
                    .map(|body| (path.clone(), body))
                    .map_err(|e| StoreError::serialization(&path, e))
            })
            .collect::<Result<Vec<_>>>()?;

        for (path, body) in objects {
            self.operator
                .write(&path, body)
                .await
                .map_err(|e| StoreError::backend("upsert", key, e))?;
        }
        Ok(records.len())
    }

    async fn read(&self, key: &DeviceCategoryKey) -> Result<Vec<LogicalRecord>> {
        let mut records = Vec::new();
        for path in self.record_paths(key).await? {
            let data = self
                .operator
                .read(&path)
                .await
                .map_err(|e| StoreError::backend("read", key, e))?;
            let record: LogicalRecord = serde_json::from_slice(&data.to_vec())
                .map_err(|e| StoreError::serialization(&path, e))?;
            records.push(record);
        }
        records.sort_by_key(LogicalRecord::record_key);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofstats_core::{DeviceId, PortRecord, StatCategory};

    fn memory_store() -> OpendalStore {
        let operator = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        OpendalStore::new(operator)
    }

    fn port(n: u32, rx_packets: u64) -> LogicalRecord {
        LogicalRecord::Port(PortRecord {
            connector: format!("openflow:1:{n}"),
            port_no: n,
            rx_packets,
            tx_packets: 0,
            rx_bytes: 0,
            tx_bytes: 0,
            rx_dropped: 0,
            tx_dropped: 0,
            rx_errors: 0,
            tx_errors: 0,
            rx_frame_err: 0,
            rx_over_err: 0,
            rx_crc_err: 0,
            collisions: 0,
            duration_sec: 0,
            duration_nsec: 0,
        })
    }

    #[tokio::test]
    async fn read_of_an_empty_key_is_empty() {
        let store = memory_store();
        let key = DeviceCategoryKey::new(DeviceId::new(1), StatCategory::Port);
        assert!(store.read(&key).await.unwrap().is_empty());
        assert_eq!(store.delete_range(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_then_read_replaces_same_record() {
        let store = memory_store();
        let key = DeviceCategoryKey::new(DeviceId::new(1), StatCategory::Port);

        store.upsert(&key, &[port(1, 5), port(2, 5)]).await.unwrap();
        store.upsert(&key, &[port(1, 50)]).await.unwrap();

        let records = store.read(&key).await.unwrap();
        assert_eq!(records, vec![port(1, 50), port(2, 5)]);
    }

    #[tokio::test]
    async fn delete_range_leaves_other_categories() {
        let store = memory_store();
        let ports = DeviceCategoryKey::new(DeviceId::new(1), StatCategory::Port);
        let flows = DeviceCategoryKey::new(DeviceId::new(1), StatCategory::Flow);

        store.upsert(&ports, &[port(1, 1), port(2, 1)]).await.unwrap();
        store.upsert(&flows, &[port(3, 1)]).await.unwrap();

        assert_eq!(store.delete_range(&ports).await.unwrap(), 2);
        assert!(store.read(&ports).await.unwrap().is_empty());
        assert_eq!(store.read(&flows).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fs_store_persists_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = OpendalStore::new_fs(dir.path().to_str().unwrap()).unwrap();
        let key = DeviceCategoryKey::new(DeviceId::new(3), StatCategory::Port);

        store.upsert(&key, &[port(4, 2)]).await.unwrap();

        let device_dir = dir.path().join("openflow:3").join("port");
        let files: Vec<_> = std::fs::read_dir(device_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(store.read(&key).await.unwrap(), vec![port(4, 2)]);
    }

    #[tokio::test]
    async fn failed_object_write_reports_backend_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = OpendalStore::new_fs(dir.path().to_str().unwrap()).unwrap();
        let key = DeviceCategoryKey::new(DeviceId::new(3), StatCategory::Port);

        // A plain file where the category directory belongs.
        std::fs::create_dir(dir.path().join("openflow:3")).unwrap();
        std::fs::write(dir.path().join("openflow:3").join("port"), b"").unwrap();

        let err = store
            .upsert(&key, &[port(1, 1), port(2, 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "S001");
        assert!(dir.path().join("openflow:3").join("port").is_file());
    }
}
