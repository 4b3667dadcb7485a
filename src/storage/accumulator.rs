use super::{Datapoint, Namespace, ShardId, StorageError};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Write sink through which a bootstrap process delivers reconstructed data.
pub trait DataAccumulator: Send {
    fn write(&mut self, shard: ShardId, series_id: &str, point: Datapoint)
        -> Result<(), StorageError>;

    /// Number of datapoints accepted so far.
    fn writes(&self) -> u64;
}

/// Accumulator scoped to one namespace and one pass.
///
/// Only shards that were bootstrap targets in the owning pass are writable.
pub struct NamespaceDataAccumulator {
    namespace: Arc<dyn Namespace>,
    shards: BTreeSet<ShardId>,
    writes: u64,
}

impl NamespaceDataAccumulator {
    pub fn new(namespace: Arc<dyn Namespace>, shards: impl IntoIterator<Item = ShardId>) -> Self {
        Self {
            namespace,
            shards: shards.into_iter().collect(),
            writes: 0,
        }
    }
}

impl fmt::Debug for NamespaceDataAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceDataAccumulator")
            .field("namespace", self.namespace.id())
            .field("shards", &self.shards)
            .field("writes", &self.writes)
            .finish()
    }
}

impl DataAccumulator for NamespaceDataAccumulator {
    fn write(
        &mut self,
        shard: ShardId,
        series_id: &str,
        point: Datapoint,
    ) -> Result<(), StorageError> {
        if !self.shards.contains(&shard) {
            return Err(StorageError::ShardNotOwned { shard });
        }
        self.namespace.load(shard, series_id, point)?;
        self.writes += 1;
        Ok(())
    }

    fn writes(&self) -> u64 {
        self.writes
    }
}
