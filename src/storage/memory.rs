//! In-memory storage that honors the bootstrap gating rules: nothing is readable,
//! flushable, or snapshottable until its shard (or namespace) has bootstrapped.

use super::{
    Database, Datapoint, Namespace, NamespaceId, NamespaceMetadata, Shard, ShardId, StorageError,
};
use crate::lifecycle::bootstrap::{BootstrapState, NamespaceResult};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct MemoryShard {
    id: ShardId,
    inner: Mutex<ShardInner>,
}

#[derive(Debug)]
struct ShardInner {
    state: BootstrapState,
    series: BTreeMap<String, Vec<Datapoint>>,
}

impl MemoryShard {
    pub fn new(id: ShardId) -> Self {
        Self::with_state(id, BootstrapState::NotBootstrapped)
    }

    /// A shard that already finished bootstrapping, e.g. one retained across a reshard.
    pub fn bootstrapped(id: ShardId) -> Self {
        Self::with_state(id, BootstrapState::Bootstrapped)
    }

    fn with_state(id: ShardId, state: BootstrapState) -> Self {
        Self {
            id,
            inner: Mutex::new(ShardInner {
                state,
                series: BTreeMap::new(),
            }),
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.inner.lock().state
    }

    pub fn begin_bootstrap(&self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.state == BootstrapState::Bootstrapping {
            return Err(StorageError::ShardIsBootstrapping);
        }
        inner.state = BootstrapState::Bootstrapping;
        Ok(())
    }

    pub fn finish_bootstrap(&self) {
        self.inner.lock().state = BootstrapState::Bootstrapped;
    }

    /// Bootstrapped shards take new data through the write path only.
    pub fn load(&self, series_id: &str, point: Datapoint) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.state == BootstrapState::Bootstrapped {
            return Err(StorageError::ShardAlreadyBootstrapped);
        }
        inner
            .series
            .entry(series_id.to_string())
            .or_default()
            .push(point);
        Ok(())
    }

    pub fn read(&self, series_id: &str) -> Result<Vec<Datapoint>, StorageError> {
        let inner = self.inner.lock();
        if inner.state != BootstrapState::Bootstrapped {
            return Err(StorageError::ShardNotBootstrappedToRead);
        }
        Ok(inner.series.get(series_id).cloned().unwrap_or_default())
    }

    pub fn check_flush(&self) -> Result<(), StorageError> {
        if self.state() != BootstrapState::Bootstrapped {
            return Err(StorageError::ShardNotBootstrappedToFlush);
        }
        Ok(())
    }

    pub fn check_snapshot(&self) -> Result<(), StorageError> {
        if self.state() != BootstrapState::Bootstrapped {
            return Err(StorageError::ShardNotBootstrappedToSnapshot);
        }
        Ok(())
    }

    pub fn series_count(&self) -> usize {
        self.inner.lock().series.len()
    }
}

impl Shard for MemoryShard {
    fn id(&self) -> ShardId {
        self.id
    }

    fn is_bootstrapped(&self) -> bool {
        self.state() == BootstrapState::Bootstrapped
    }
}

#[derive(Debug)]
pub struct MemoryNamespace {
    metadata: NamespaceMetadata,
    shards: Vec<Arc<MemoryShard>>,
    inner: Mutex<NamespaceInner>,
}

#[derive(Debug)]
struct NamespaceInner {
    state: BootstrapState,
    index_bootstrapped: bool,
    bootstraps: usize,
}

impl MemoryNamespace {
    pub fn new(metadata: NamespaceMetadata, shards: Vec<MemoryShard>) -> Self {
        Self {
            metadata,
            shards: shards.into_iter().map(Arc::new).collect(),
            inner: Mutex::new(NamespaceInner {
                state: BootstrapState::NotBootstrapped,
                index_bootstrapped: false,
                bootstraps: 0,
            }),
        }
    }

    pub fn shard(&self, id: ShardId) -> Option<Arc<MemoryShard>> {
        self.shards.iter().find(|shard| shard.id == id).cloned()
    }

    pub fn state(&self) -> BootstrapState {
        self.inner.lock().state
    }

    /// Number of bootstrap results this namespace has accepted or rejected.
    pub fn bootstrap_count(&self) -> usize {
        self.inner.lock().bootstraps
    }

    pub fn check_flush(&self) -> Result<(), StorageError> {
        if self.state() != BootstrapState::Bootstrapped {
            return Err(StorageError::NamespaceNotBootstrapped);
        }
        Ok(())
    }

    pub fn check_index_read(&self) -> Result<(), StorageError> {
        if !self.inner.lock().index_bootstrapped {
            return Err(StorageError::IndexNotBootstrappedToRead);
        }
        Ok(())
    }
}

impl Namespace for MemoryNamespace {
    fn id(&self) -> &NamespaceId {
        &self.metadata.id
    }

    fn metadata(&self) -> NamespaceMetadata {
        self.metadata.clone()
    }

    fn owned_shards(&self) -> Vec<Arc<dyn Shard>> {
        self.shards
            .iter()
            .map(|shard| Arc::clone(shard) as Arc<dyn Shard>)
            .collect()
    }

    fn load(&self, shard: ShardId, series_id: &str, point: Datapoint) -> Result<(), StorageError> {
        let target = self
            .shard(shard)
            .ok_or(StorageError::ShardNotOwned { shard })?;
        target.load(series_id, point)
    }

    fn bootstrap(&self, result: NamespaceResult) -> Result<(), StorageError> {
        {
            let mut inner = self.inner.lock();
            if inner.state == BootstrapState::Bootstrapping {
                return Err(StorageError::NamespaceIsBootstrapping);
            }
            inner.state = BootstrapState::Bootstrapping;
            inner.bootstraps += 1;
        }

        let mut unfulfilled = Vec::new();
        let mut first_error = None;
        for shard in &self.shards {
            if !result.shards.contains(&shard.id) || shard.is_bootstrapped() {
                continue;
            }
            if result.unfulfilled.contains(&shard.id) {
                unfulfilled.push(shard.id);
                continue;
            }
            match shard.begin_bootstrap() {
                Ok(()) => shard.finish_bootstrap(),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        {
            let mut inner = self.inner.lock();
            inner.state = BootstrapState::Bootstrapped;
            inner.index_bootstrapped = self.metadata.index_enabled;
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if !unfulfilled.is_empty() {
            debug!(
                "event=namespace_bootstrap_unfulfilled namespace={} shards={:?}",
                self.metadata.id, unfulfilled
            );
            return Err(StorageError::Unfulfilled {
                shards: unfulfilled,
            });
        }
        Ok(())
    }
}

/// Ownership view backed by a mutable namespace list, so tests and embedders can
/// model resharding between passes.
#[derive(Default)]
pub struct MemoryDatabase {
    namespaces: RwLock<Vec<Arc<dyn Namespace>>>,
}

impl MemoryDatabase {
    pub fn new(namespaces: Vec<Arc<dyn Namespace>>) -> Self {
        Self {
            namespaces: RwLock::new(namespaces),
        }
    }

    pub fn add_namespace(&self, namespace: Arc<dyn Namespace>) {
        info!("event=namespace_owned namespace={}", namespace.id());
        self.namespaces.write().push(namespace);
    }

    pub fn remove_namespace(&self, id: &NamespaceId) -> bool {
        let mut namespaces = self.namespaces.write();
        let before = namespaces.len();
        namespaces.retain(|namespace| namespace.id() != id);
        let removed = namespaces.len() != before;
        if removed {
            info!("event=namespace_released namespace={}", id);
        }
        removed
    }
}

impl Database for MemoryDatabase {
    fn owned_namespaces(&self) -> Result<Vec<Arc<dyn Namespace>>, StorageError> {
        Ok(self.namespaces.read().clone())
    }
}
