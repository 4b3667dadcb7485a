mod error;
mod registry;

pub use error::TelemetryError;
pub use registry::{MetricsSnapshot, SharedMetricsRegistry};
