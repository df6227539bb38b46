//! Error types for the statistics store

use ofstats_core::DeviceCategoryKey;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// S001: Backend operation failed
    S001BackendFailure,
    /// S002: Record could not be serialized or deserialized
    S002Serialization,
    /// S003: An earlier write for the same key failed
    S003PredecessorFailed,
    /// S004: Store configuration missing or invalid
    S004InvalidConfig,
    /// S005: Write task ended without producing a result
    S005WriteAborted,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S001BackendFailure => "S001",
            Self::S002Serialization => "S002",
            Self::S003PredecessorFailed => "S003",
            Self::S004InvalidConfig => "S004",
            Self::S005WriteAborted => "S005",
        }
    }
}

/// Errors raised by stores and by the reconciler's write chains.
///
/// Cloneable because one write outcome is observed by every handle on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("[{code}] {operation} failed for '{key}': {reason}")]
    Backend {
        code: &'static str,
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("[{code}] Failed to (de)serialize record at '{path}': {reason}")]
    Serialization {
        code: &'static str,
        path: String,
        reason: String,
    },

    /// The merge was not applied because the write before it failed
    #[error("[{code}] Skipped write for '{key}': a previous write for this key failed")]
    PredecessorFailed { code: &'static str, key: String },

    #[error("[{code}] Invalid store configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    #[error("[{code}] Write task for '{key}' aborted: {reason}")]
    WriteAborted {
        code: &'static str,
        key: String,
        reason: String,
    },
}

impl StoreError {
    pub fn backend(operation: &'static str, key: impl ToString, reason: impl ToString) -> Self {
        Self::Backend {
            code: ErrorCode::S001BackendFailure.as_str(),
            operation,
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn serialization(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Serialization {
            code: ErrorCode::S002Serialization.as_str(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn predecessor_failed(key: &DeviceCategoryKey) -> Self {
        Self::PredecessorFailed {
            code: ErrorCode::S003PredecessorFailed.as_str(),
            key: key.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::S004InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    pub fn write_aborted(key: &DeviceCategoryKey, reason: impl ToString) -> Self {
        Self::WriteAborted {
            code: ErrorCode::S005WriteAborted.as_str(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Backend { code, .. }
            | Self::Serialization { code, .. }
            | Self::PredecessorFailed { code, .. }
            | Self::InvalidConfig { code, .. }
            | Self::WriteAborted { code, .. } => code,
        }
    }
}

/// Result type alias for StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
