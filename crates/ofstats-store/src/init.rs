use std::sync::Arc;

use ofstats_config::{StoreBackend, StoreConfig};

use crate::error::{Result, StoreError};
use crate::opendal_store::OpendalStore;
use crate::store::{MemoryStore, StatsStore};

/// Build the configured store backend.
pub fn initialize_store(config: &StoreConfig) -> Result<Arc<dyn StatsStore>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!(backend = %config.backend, "Initialized statistics store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                StoreError::invalid_config("fs config required for filesystem backend")
            })?;
            let store = OpendalStore::new_fs(&fs.path)?;
            tracing::info!(backend = %config.backend, path = %fs.path, "Initialized statistics store");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofstats_config::FsConfig;

    #[test]
    fn fs_backend_requires_a_path() {
        let config = StoreConfig {
            backend: StoreBackend::Fs,
            fs: None,
        };
        let err = initialize_store(&config).err().unwrap();
        assert_eq!(err.code(), "S004");
    }

    #[test]
    fn builds_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::Fs,
            fs: Some(FsConfig {
                path: dir.path().display().to_string(),
            }),
        };
        assert!(initialize_store(&config).is_ok());
    }
}
