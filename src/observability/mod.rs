pub mod instrument;
pub mod telemetry;

pub use instrument::{Instrument, INVARIANT_VIOLATED_METRIC};
pub use telemetry::*;
