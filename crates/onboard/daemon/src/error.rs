//! Error types for onboard-daemon

use onboard_types::{
    ChannelAlreadyAssigned, ContractStatusError, IllegalTransition, SupplierId, UnknownCode,
};
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Lease backend error
    #[error("Lease error: {0}")]
    Lease(String),

    /// Record moved off the onboarding graph
    #[error("State error: {0}")]
    State(String),

    /// Scheduler error
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IllegalTransition> for DaemonError {
    fn from(err: IllegalTransition) -> Self {
        DaemonError::State(err.to_string())
    }
}

impl From<ContractStatusError> for DaemonError {
    fn from(err: ContractStatusError) -> Self {
        DaemonError::State(err.to_string())
    }
}

impl From<ChannelAlreadyAssigned> for DaemonError {
    fn from(err: ChannelAlreadyAssigned) -> Self {
        DaemonError::State(err.to_string())
    }
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(SupplierId),

    /// Conflict (e.g., already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

impl From<UnknownCode> for StorageError {
    fn from(err: UnknownCode) -> Self {
        StorageError::InvalidData(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Connection(err.to_string())
            }
            other => StorageError::Query(other.to_string()),
        }
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
