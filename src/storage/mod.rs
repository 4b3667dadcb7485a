//! Storage-side contracts the bootstrap manager drives: the database's ownership
//! view, namespaces, shards, and the per-pass data accumulator.

pub mod accumulator;
pub mod memory;

use crate::lifecycle::bootstrap::NamespaceResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

pub use accumulator::{DataAccumulator, NamespaceDataAccumulator};
pub use memory::{MemoryDatabase, MemoryNamespace, MemoryShard};

pub type ShardId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespaceId(String);

impl NamespaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NamespaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NamespaceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceMetadata {
    pub id: NamespaceId,
    pub index_enabled: bool,
}

impl NamespaceMetadata {
    pub fn new(id: impl Into<NamespaceId>) -> Self {
        Self {
            id: id.into(),
            index_enabled: true,
        }
    }

    pub fn with_index_enabled(mut self, enabled: bool) -> Self {
        self.index_enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    pub timestamp: SystemTime,
    pub value: f64,
}

impl Datapoint {
    pub fn new(timestamp: SystemTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("namespace is bootstrapping")]
    NamespaceIsBootstrapping,
    #[error("namespace is not yet bootstrapped")]
    NamespaceNotBootstrapped,
    #[error("shard is bootstrapping")]
    ShardIsBootstrapping,
    #[error("shard is already bootstrapped")]
    ShardAlreadyBootstrapped,
    #[error("shard is not yet bootstrapped to flush")]
    ShardNotBootstrappedToFlush,
    #[error("shard is not yet bootstrapped to snapshot")]
    ShardNotBootstrappedToSnapshot,
    #[error("shard is not yet bootstrapped to read")]
    ShardNotBootstrappedToRead,
    #[error("index is not yet bootstrapped to read")]
    IndexNotBootstrappedToRead,
    #[error("shard {shard} is not owned")]
    ShardNotOwned { shard: ShardId },
    #[error("bootstrap left shards unfulfilled: {shards:?}")]
    Unfulfilled { shards: Vec<ShardId> },
    #[error("{0}")]
    Other(String),
}

/// A single data partition and its individual bootstrap status.
pub trait Shard: Send + Sync {
    fn id(&self) -> ShardId;
    fn is_bootstrapped(&self) -> bool;
}

pub trait Namespace: Send + Sync {
    fn id(&self) -> &NamespaceId;
    fn metadata(&self) -> NamespaceMetadata;
    fn owned_shards(&self) -> Vec<Arc<dyn Shard>>;

    /// Loads one reconstructed datapoint into `shard`. Called by the process through
    /// the pass's accumulator.
    fn load(&self, shard: ShardId, series_id: &str, point: Datapoint) -> Result<(), StorageError>;

    /// Applies this namespace's slice of a bootstrap result. May partially fail.
    fn bootstrap(&self, result: NamespaceResult) -> Result<(), StorageError>;
}

pub trait Database: Send + Sync {
    /// Snapshot of the namespaces this node currently owns.
    fn owned_namespaces(&self) -> Result<Vec<Arc<dyn Namespace>>, StorageError>;
}
