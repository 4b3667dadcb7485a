//! Bootstrap orchestration core for a storage node.
//!
//! [`BootstrapManager`] decides when a bootstrap run happens, coalesces requests
//! that arrive while one is in flight, pauses background file operations for the
//! duration of the run, and reconciles each pass's results so that one
//! namespace's failure never blocks its siblings.

pub mod clock;
pub mod lifecycle;
pub mod mediator;
pub mod observability;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use lifecycle::bootstrap::{
    build_targets, BootstrapConfig, BootstrapError, BootstrapManager, BootstrapPass,
    BootstrapResult, BootstrapState, BootstrapTargets, ConfigError, MultiError, NamespaceResult,
    Process, ProcessError, ProcessNamespace, ProcessProvider,
};
pub use mediator::{FileOpsGuard, Mediator};
pub use observability::{Instrument, MetricsSnapshot, SharedMetricsRegistry, TelemetryError};
pub use storage::{
    DataAccumulator, Database, Datapoint, MemoryDatabase, MemoryNamespace, MemoryShard, Namespace,
    NamespaceDataAccumulator, NamespaceId, NamespaceMetadata, Shard, ShardId, StorageError,
};
