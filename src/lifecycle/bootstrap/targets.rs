use super::process::ProcessNamespace;
use crate::storage::{Namespace, NamespaceDataAccumulator, ShardId};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Work descriptors for a single pass.
#[derive(Debug)]
pub struct BootstrapTargets {
    /// One entry per owned namespace, in enumeration order, including namespaces
    /// with nothing left to bootstrap.
    pub namespaces: Vec<ProcessNamespace>,
    /// Distinct shard ids across all namespaces. Advisory, for logging only.
    pub unique_shards: usize,
}

impl BootstrapTargets {
    pub fn shard_count(&self) -> usize {
        self.namespaces.iter().map(|ns| ns.shards.len()).sum()
    }
}

pub fn build_targets(namespaces: &[Arc<dyn Namespace>]) -> BootstrapTargets {
    let mut unique_shards = BTreeSet::new();
    let mut targets = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        let shards: Vec<ShardId> = namespace
            .owned_shards()
            .iter()
            .filter(|shard| !shard.is_bootstrapped())
            .map(|shard| shard.id())
            .collect();
        unique_shards.extend(shards.iter().copied());

        let accumulator = NamespaceDataAccumulator::new(Arc::clone(namespace), shards.clone());
        targets.push(ProcessNamespace {
            metadata: namespace.metadata(),
            shards,
            data_accumulator: Box::new(accumulator),
        });
    }
    BootstrapTargets {
        namespaces: targets,
        unique_shards: unique_shards.len(),
    }
}
