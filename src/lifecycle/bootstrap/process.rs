//! Contract with the component that actually reconstructs data (from disk, peers,
//! or the commit log). The manager only decides when it runs and reconciles what
//! it returns.

use crate::storage::{DataAccumulator, NamespaceId, NamespaceMetadata, ShardId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("bootstrap source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("{0}")]
    Failed(String),
}

/// One namespace's share of a pass.
pub struct ProcessNamespace {
    pub metadata: NamespaceMetadata,
    /// Owned shards not yet individually bootstrapped, in ownership order.
    pub shards: Vec<ShardId>,
    pub data_accumulator: Box<dyn DataAccumulator>,
}

impl fmt::Debug for ProcessNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessNamespace")
            .field("namespace", &self.metadata.id)
            .field("shards", &self.shards)
            .field("writes", &self.data_accumulator.writes())
            .finish()
    }
}

/// Per-namespace outcome of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceResult {
    /// Shards the pass covered.
    pub shards: BTreeSet<ShardId>,
    /// Covered shards whose data could not be fully reconstructed.
    pub unfulfilled: BTreeSet<ShardId>,
}

impl NamespaceResult {
    pub fn new(shards: impl IntoIterator<Item = ShardId>) -> Self {
        Self {
            shards: shards.into_iter().collect(),
            unfulfilled: BTreeSet::new(),
        }
    }

    pub fn with_unfulfilled(mut self, shard: ShardId) -> Self {
        self.shards.insert(shard);
        self.unfulfilled.insert(shard);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapResult {
    results: HashMap<NamespaceId, NamespaceResult>,
}

impl BootstrapResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, namespace: NamespaceId, result: NamespaceResult) {
        self.results.insert(namespace, result);
    }

    pub fn get(&self, namespace: &NamespaceId) -> Option<&NamespaceResult> {
        self.results.get(namespace)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<(NamespaceId, NamespaceResult)> for BootstrapResult {
    fn from_iter<I: IntoIterator<Item = (NamespaceId, NamespaceResult)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// Executes one bootstrap pass over the supplied targets.
pub trait Process: Send {
    fn run(
        &mut self,
        start: SystemTime,
        targets: Vec<ProcessNamespace>,
    ) -> Result<BootstrapResult, ProcessError>;
}

/// Yields a fresh process for every pass; instances are never reused.
pub trait ProcessProvider: Send + Sync {
    fn provide(&self) -> Result<Box<dyn Process>, ProcessError>;
}
