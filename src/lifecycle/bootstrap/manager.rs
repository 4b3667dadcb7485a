//! Bootstrap manager: decides when a bootstrap run happens and folds requests
//! that arrive mid-run into a single follow-up pass.
//!
//! A run pauses background file operations, executes passes until no request is
//! pending, records its completion time, and resumes file operations. The run
//! ends `Bootstrapped` even when passes fail; failures travel back to the caller
//! in the returned error. Bootstrapped data is not flushed here; the regular
//! maintenance cycle picks it up so restarting nodes do not flush in lockstep.

use super::config::BootstrapConfig;
use super::error::{BootstrapError, MultiError};
use super::pass::BootstrapPass;
use super::process::ProcessProvider;
use super::state::BootstrapState;
use crate::clock::{Clock, SystemClock};
use crate::mediator::{FileOpsGuard, Mediator};
use crate::observability::Instrument;
use crate::storage::Database;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::SystemTime;

pub const BOOTSTRAPPED_METRIC: &str = "bootstrapped";
pub const ENQUEUED_METRIC: &str = "bootstrap.enqueued";

#[derive(Debug, Default)]
struct RunState {
    state: BootstrapState,
    // Only ever true while `state` is `Bootstrapping`.
    has_pending: bool,
}

/// Moves an unwinding run out of `Bootstrapping`, so later requests start a new
/// run instead of queueing behind one that no longer exists.
struct RunGuard<'a> {
    run: &'a Mutex<RunState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let mut run = self.run.lock();
        run.has_pending = false;
        run.state = BootstrapState::Bootstrapped;
        drop(run);
        warn!("event=bootstrap_run_aborted reason=panic");
    }
}

pub struct BootstrapManager {
    database: Arc<dyn Database>,
    mediator: Arc<dyn Mediator>,
    provider: Arc<dyn ProcessProvider>,
    clock: Arc<dyn Clock>,
    instrument: Instrument,
    run: Mutex<RunState>,
    last_completion: RwLock<Option<SystemTime>>,
}

impl BootstrapManager {
    pub fn new(
        database: Arc<dyn Database>,
        mediator: Arc<dyn Mediator>,
        provider: Arc<dyn ProcessProvider>,
        config: &BootstrapConfig,
    ) -> Self {
        Self {
            database,
            mediator,
            provider,
            clock: Arc::new(SystemClock),
            instrument: config.instrument(),
            run: Mutex::new(RunState::default()),
            last_completion: RwLock::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instrument = instrument;
        self
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn state(&self) -> BootstrapState {
        self.run.lock().state
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.state() == BootstrapState::Bootstrapped
    }

    /// When the most recent run finished, successful or not. `None` until the
    /// first run completes.
    pub fn last_bootstrap_completion_time(&self) -> Option<SystemTime> {
        *self.last_completion.read()
    }

    /// Publishes the `bootstrapped` gauge (1 or 0).
    pub fn report(&self) {
        let value = u64::from(self.is_bootstrapped());
        self.instrument.set_gauge(BOOTSTRAPPED_METRIC, value);
    }

    /// Bootstraps every owned namespace, blocking until no pass is pending.
    ///
    /// Returns [`BootstrapError::Enqueued`] without waiting when a run is already
    /// in flight; the in-flight run will execute one more pass on its behalf.
    pub fn bootstrap(&self) -> Result<(), BootstrapError> {
        {
            let mut run = self.run.lock();
            if run.state == BootstrapState::Bootstrapping {
                run.has_pending = true;
                drop(run);
                info!("event=bootstrap_enqueued");
                self.instrument.inc(ENQUEUED_METRIC);
                return Err(BootstrapError::Enqueued);
            }
            run.state = BootstrapState::Bootstrapping;
        }

        // Declared first so it drops last: file ops are re-enabled before an
        // unwinding run gives up `Bootstrapping`.
        let _run = RunGuard { run: &self.run };
        // File operations stay paused for the whole run, not per pass.
        let _file_ops = FileOpsGuard::new(self.mediator.as_ref());
        self.run_until_idle()
    }

    fn run_until_idle(&self) -> Result<(), BootstrapError> {
        let mut failures = MultiError::new();
        let mut passes = 0usize;
        loop {
            passes += 1;
            let pass = BootstrapPass::new(
                self.database.as_ref(),
                self.provider.as_ref(),
                self.clock.as_ref(),
                &self.instrument,
            );
            if let Err(err) = pass.execute() {
                failures.add(err);
            }

            let mut run = self.run.lock();
            if !run.has_pending {
                // Stamped in the same critical section as the transition. A run
                // that starts after this point but before `FileOpsGuard` drops has
                // its pause lifted early by this run's resume.
                *self.last_completion.write() = Some(self.clock.now());
                run.state = BootstrapState::Bootstrapped;
                break;
            }
            run.has_pending = false;
            debug!("event=bootstrap_pass_coalesced next_pass={}", passes + 1);
        }

        info!(
            "event=bootstrap_run_completed passes={} errors={}",
            passes,
            failures.len()
        );
        failures.into_result()
    }
}
