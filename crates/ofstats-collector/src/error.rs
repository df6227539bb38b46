//! Structured failure of one logical collection

use std::fmt;
use std::time::Duration;

use ofstats_core::{DeviceId, StatCategory, TranslationError};
use ofstats_store::StoreError;
use thiserror::Error;

/// Where in a collection the failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The request for the category could not be built
    Encode,
    /// Another collection for the same device and category is still live
    Register,
    /// The device sink refused the request
    Send,
    /// A fragment body could not be translated at all
    Translate,
    /// A purge or merge write failed
    Store,
    /// No fragment arrived within the fragment timeout
    Timeout,
    /// The driver went away while the request was live
    Shutdown,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Register => "register",
            Self::Send => "send",
            Self::Translate => "translate",
            Self::Store => "store",
            Self::Timeout => "timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectFailure {
    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("collection xid {0} for this device and category is still live")]
    InProgress(u32),

    #[error("device sink rejected the request: {0}")]
    Sink(String),

    #[error("no fragment received within {0:?}")]
    Timeout(Duration),

    #[error("aggregation driver shut down")]
    Shutdown,
}

/// A rejected collection, identifying the request and the failing stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("collecting {category} statistics from {device} (xid {xid}) failed at {stage}: {source}")]
pub struct CollectError {
    pub device: DeviceId,
    pub category: StatCategory,
    pub xid: u32,
    pub stage: Stage,
    #[source]
    pub source: CollectFailure,
}

impl CollectError {
    pub fn new(
        device: DeviceId,
        category: StatCategory,
        xid: u32,
        stage: Stage,
        source: impl Into<CollectFailure>,
    ) -> Self {
        Self {
            device,
            category,
            xid,
            stage,
            source: source.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.stage == Stage::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_request_and_stage() {
        let err = CollectError::new(
            DeviceId::new(7),
            StatCategory::Port,
            42,
            Stage::Timeout,
            CollectFailure::Timeout(Duration::from_secs(30)),
        );
        let message = err.to_string();
        assert!(message.contains("openflow:7"));
        assert!(message.contains("port"));
        assert!(message.contains("xid 42"));
        assert!(message.contains("failed at timeout"));
        assert!(err.is_timeout());
    }

    #[test]
    fn store_errors_convert() {
        let key = ofstats_core::DeviceCategoryKey::new(DeviceId::new(1), StatCategory::Flow);
        let err = CollectError::new(
            key.device,
            key.category,
            1,
            Stage::Store,
            StoreError::predecessor_failed(&key),
        );
        assert!(matches!(err.source, CollectFailure::Store(_)));
    }
}
