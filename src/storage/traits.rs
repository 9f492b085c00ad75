//! Gateway trait definitions

use super::statement::{BatchStats, GraphWrite, Query, Row};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while talking to the graph store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for gateway operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Request/response boundary to a graph store.
///
/// Implementations must be thread-safe (Send + Sync): the ingestion pipeline
/// and the HTTP handlers share one gateway. Retry and connection policy
/// belong to the implementation, callers never retry.
#[async_trait]
pub trait GraphGateway: Send + Sync {
    /// Execute an ordered batch of mutations as one all-or-nothing unit.
    async fn execute_batch(&self, batch: &GraphWrite) -> StorageResult<BatchStats>;

    /// Run a read query and return its rows in order.
    async fn execute_query(&self, query: &Query) -> StorageResult<Vec<Row>>;

    /// Cheap liveness probe
    async fn check(&self) -> StorageResult<()>;

    /// Create the uniqueness constraints the merge statements rely on.
    /// Safe to call repeatedly.
    async fn ensure_constraints(&self) -> StorageResult<()>;
}

/// Extension trait for opening gateways backed by a local file
pub trait OpenGateway: GraphGateway + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
