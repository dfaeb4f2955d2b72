//! Common error types for QGate
//!
//! This module defines all error types used across the gateway. Every failure
//! the registry surfaces to a caller has its own variant so callers can tell a
//! liveness rejection apart from a storage no-op or an empty registry.

use thiserror::Error;

/// Main error type for QGate
#[derive(Error, Debug)]
pub enum GatewayError {
    /// No coordinator is registered at selection time
    #[error("No active coordinator")]
    NoActiveCoordinator,

    /// The liveness probe rejected a coordinator during admission
    #[error("Coordinator is inactive: {host}:{port}")]
    InactiveCoordinator { host: String, port: u16 },

    /// The durable store accepted the insert but affected zero rows
    #[error("Coordinator {host}:{port} passed liveness but was not persisted")]
    PersistenceNoop { host: String, port: u16 },

    /// The durable store affected zero rows on delete
    #[error("Remove coordinator failed: {host}:{port} is unknown to storage")]
    RemovalFailed { host: String, port: u16 },

    /// Durable and in-memory state diverged
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Index past the end of the registry
    #[error("Index {index} out of range for registry of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// Coordinator key already present in the registry
    #[error("Duplicate coordinator: {host}:{port}")]
    DuplicateCoordinator { host: String, port: u16 },

    /// Malformed coordinator address
    #[error("Invalid coordinator: {0}")]
    InvalidCoordinator(String),

    /// Durable store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        GatewayError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(err: tokio::task::JoinError) -> Self {
        GatewayError::Internal(format!("Task failed: {}", err))
    }
}

impl GatewayError {
    /// Stable, low-cardinality label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::NoActiveCoordinator => "no_active_coordinator",
            GatewayError::InactiveCoordinator { .. } => "inactive_coordinator",
            GatewayError::PersistenceNoop { .. } => "persistence_noop",
            GatewayError::RemovalFailed { .. } => "removal_failed",
            GatewayError::InternalInconsistency(_) => "internal_inconsistency",
            GatewayError::IndexOutOfRange { .. } => "index_out_of_range",
            GatewayError::DuplicateCoordinator { .. } => "duplicate_coordinator",
            GatewayError::InvalidCoordinator(_) => "invalid_coordinator",
            GatewayError::Storage(_) => "storage",
            GatewayError::Config(_) => "config",
            GatewayError::Io(_) => "io",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// Is this worth retrying later?
    ///
    /// An empty registry or an inactive node may change once the health
    /// monitor runs again; storage errors are usually transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::NoActiveCoordinator
                | GatewayError::InactiveCoordinator { .. }
                | GatewayError::Storage(_)
        )
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        GatewayError::Config(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        GatewayError::Storage(msg.into())
    }

    /// Create an invalid coordinator error
    pub fn invalid_coordinator(msg: impl Into<String>) -> Self {
        GatewayError::InvalidCoordinator(msg.into())
    }

    /// Create an internal inconsistency error
    pub fn inconsistency(msg: impl Into<String>) -> Self {
        GatewayError::InternalInconsistency(msg.into())
    }
}

/// Result type alias for QGate operations
pub type Result<T> = std::result::Result<T, GatewayError>;
