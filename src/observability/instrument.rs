//! Instrumentation handle carried by the bootstrap manager.
//!
//! Besides plain metrics, it owns the invariant-violation channel: a counter that
//! monitoring alerts on, a log line emitted by the caller, and an optional panic
//! for environments that want contract breaches to be fatal.

use super::telemetry::SharedMetricsRegistry;
use log::warn;

pub const INVARIANT_VIOLATED_METRIC: &str = "invariant_violated";

#[derive(Debug, Clone)]
pub struct Instrument {
    metrics: SharedMetricsRegistry,
    panic_on_invariant_violation: bool,
}

impl Instrument {
    pub fn new(metrics: SharedMetricsRegistry) -> Self {
        Self {
            metrics,
            panic_on_invariant_violation: false,
        }
    }

    pub fn with_panic_on_invariant_violation(mut self, enabled: bool) -> Self {
        self.panic_on_invariant_violation = enabled;
        self
    }

    pub fn metrics(&self) -> &SharedMetricsRegistry {
        &self.metrics
    }

    pub fn panics_on_invariant_violation(&self) -> bool {
        self.panic_on_invariant_violation
    }

    /// Increments `name` by one; metric failures are logged, never propagated.
    pub fn inc(&self, name: &str) {
        if let Err(err) = self.metrics.inc_counter(name, 1) {
            warn!("event=metrics_update_failed metric={} error={}", name, err);
        }
    }

    pub fn set_gauge(&self, name: &str, value: u64) {
        if let Err(err) = self.metrics.set_gauge(name, value) {
            warn!("event=metrics_update_failed metric={} error={}", name, err);
        }
    }

    /// Records an invariant violation, then runs `log_fn` so the caller can log
    /// with its own context. Panics afterwards when configured to.
    pub fn emit_and_log_invariant_violation<F: FnOnce()>(&self, log_fn: F) {
        self.inc(INVARIANT_VIOLATED_METRIC);
        log_fn();
        if self.panic_on_invariant_violation {
            panic!("invariant violated");
        }
    }
}
