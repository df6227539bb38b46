use super::{FsConfig, LogFormat, RuntimeConfig, StoreBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "OFSTATS_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the OFSTATS_ prefix
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Collector
    if let Some(val) = get_env_u64(env, "FRAGMENT_TIMEOUT_MS")? {
        config.collector.fragment_timeout_ms = val;
    }
    if let Some(val) = get_env_usize(env, "LATE_XID_MEMORY")? {
        config.collector.late_xid_memory = val;
    }
    if let Some(val) = get_env_usize(env, "QUEUE_DEPTH")? {
        config.collector.queue_depth = val;
    }

    // Store
    if let Some(backend) = env.get("STORE_BACKEND") {
        config.store.backend = backend
            .parse::<StoreBackend>()
            .context("Invalid OFSTATS_STORE_BACKEND value")?;
    }
    if let Some(path) = env.get("STORE_PATH") {
        config.store.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
