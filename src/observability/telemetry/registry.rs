use super::error::TelemetryError;
use serde::Serialize;
use std::collections::{hash_map::DefaultHasher, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const METRICS_SHARD_COUNT: usize = 8;

/// Process-wide metrics sink shared by the bootstrap manager and its passes.
///
/// Names are qualified with the registry namespace (`dbnode.bootstrapped`), and
/// cells are sharded by name so concurrent writers rarely contend.
#[derive(Debug, Clone)]
pub struct SharedMetricsRegistry {
    prefix: Arc<String>,
    shards: Arc<Vec<Mutex<MetricsShard>>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.get(name).copied()
    }
}

#[derive(Debug, Default)]
struct MetricsShard {
    counters: HashMap<String, Arc<MetricCell>>,
    gauges: HashMap<String, Arc<MetricCell>>,
}

#[derive(Debug, Default)]
struct MetricCell(AtomicU64);

impl MetricCell {
    fn add(&self, delta: u64) -> u64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(delta);
            match self
                .0
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Copy)]
enum MetricKind {
    Counter,
    Gauge,
}

impl SharedMetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_shards(namespace, METRICS_SHARD_COUNT)
    }

    pub fn with_shards(namespace: impl Into<String>, shards: usize) -> Self {
        assert!(shards > 0, "shared metrics registry requires shards");
        let raw = namespace.into();
        let prefix = if raw.ends_with('.') {
            raw
        } else {
            format!("{}.", raw)
        };
        let shard_vec: Vec<Mutex<MetricsShard>> = (0..shards)
            .map(|_| Mutex::new(MetricsShard::default()))
            .collect();
        Self {
            prefix: Arc::new(prefix),
            shards: Arc::new(shard_vec),
        }
    }

    pub fn inc_counter(&self, name: impl Into<String>, delta: u64) -> Result<u64, TelemetryError> {
        Ok(self.cell(MetricKind::Counter, name.into())?.add(delta))
    }

    pub fn set_gauge(&self, name: impl Into<String>, value: u64) -> Result<(), TelemetryError> {
        self.cell(MetricKind::Gauge, name.into())?.set(value);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<MetricsSnapshot, TelemetryError> {
        let mut counters = HashMap::new();
        let mut gauges = HashMap::new();
        for shard in self.shards.iter() {
            let guard = shard.lock().map_err(|_| TelemetryError::ShardPoisoned)?;
            counters.extend(
                guard
                    .counters
                    .iter()
                    .map(|(name, cell)| (name.clone(), cell.get())),
            );
            gauges.extend(
                guard
                    .gauges
                    .iter()
                    .map(|(name, cell)| (name.clone(), cell.get())),
            );
        }
        Ok(MetricsSnapshot { counters, gauges })
    }

    /// Fully qualified name for `name`, as it appears in snapshots.
    pub fn qualified(&self, name: &str) -> String {
        self.qualify(name.to_string())
    }

    fn cell(&self, kind: MetricKind, name: String) -> Result<Arc<MetricCell>, TelemetryError> {
        let key = self.qualify(name);
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        let mut shard = self.shards[idx]
            .lock()
            .map_err(|_| TelemetryError::ShardPoisoned)?;
        let cells = match kind {
            MetricKind::Counter => &mut shard.counters,
            MetricKind::Gauge => &mut shard.gauges,
        };
        Ok(Arc::clone(cells.entry(key).or_default()))
    }

    fn qualify(&self, name: String) -> String {
        if name.starts_with(self.prefix.as_str()) {
            name
        } else {
            format!("{}{}", self.prefix, name)
        }
    }
}
