// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_collector_config(&config.collector)?;
    validate_store_config(&config.store)?;
    validate_log_config(&config.log)?;
    Ok(())
}

fn validate_collector_config(config: &CollectorConfig) -> Result<()> {
    if config.fragment_timeout_ms == 0 {
        bail!("collector.fragment_timeout_ms must be greater than 0");
    }

    if config.queue_depth == 0 {
        bail!("collector.queue_depth must be greater than 0");
    }

    if config.late_xid_memory == 0 {
        bail!("collector.late_xid_memory must be greater than 0");
    }

    // 10 minutes
    if config.fragment_timeout_ms > 600_000 {
        warn!(
            fragment_timeout_ms = config.fragment_timeout_ms,
            "collector.fragment_timeout_ms is very large; stalled devices will hold requests open"
        );
    }

    if config.late_xid_memory > 1_000_000 {
        warn!(
            late_xid_memory = config.late_xid_memory,
            "collector.late_xid_memory is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<()> {
    match config.backend {
        StoreBackend::Memory => {}
        StoreBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs store backend requires 'store.fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("store.fs.path must not be empty");
            }
        }
    }

    Ok(())
}

fn validate_log_config(config: &LogConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("log.level must not be empty");
    }
    Ok(())
}
