//! Node bootstrap orchestration: run coalescing, per-pass target building, and
//! reconciliation of process results against owned namespaces.

pub mod config;
pub mod error;
pub mod manager;
pub mod pass;
pub mod process;
pub mod state;
pub mod targets;

pub use config::{BootstrapConfig, ConfigError, PANIC_ON_INVARIANT_VIOLATED_ENV};
pub use error::{BootstrapError, MultiError};
pub use manager::{BootstrapManager, BOOTSTRAPPED_METRIC, ENQUEUED_METRIC};
pub use pass::{BootstrapPass, PASS_FAILURE_METRIC, PASS_SUCCESS_METRIC};
pub use process::{
    BootstrapResult, NamespaceResult, Process, ProcessError, ProcessNamespace, ProcessProvider,
};
pub use state::BootstrapState;
pub use targets::{build_targets, BootstrapTargets};
