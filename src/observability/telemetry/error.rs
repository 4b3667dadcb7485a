use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("metrics shard lock poisoned")]
    ShardPoisoned,
}
