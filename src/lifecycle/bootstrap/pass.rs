//! A single bootstrap pass: run the process once over the current targets and
//! reconcile its results namespace by namespace.

use super::error::{BootstrapError, MultiError};
use super::process::ProcessProvider;
use super::targets::build_targets;
use crate::clock::Clock;
use crate::observability::Instrument;
use crate::storage::Database;
use log::{error, info, warn};

pub const PASS_SUCCESS_METRIC: &str = "bootstrap.pass_success";
pub const PASS_FAILURE_METRIC: &str = "bootstrap.pass_failure";

pub struct BootstrapPass<'a> {
    database: &'a dyn Database,
    provider: &'a dyn ProcessProvider,
    clock: &'a dyn Clock,
    instrument: &'a Instrument,
}

impl<'a> BootstrapPass<'a> {
    pub fn new(
        database: &'a dyn Database,
        provider: &'a dyn ProcessProvider,
        clock: &'a dyn Clock,
        instrument: &'a Instrument,
    ) -> Self {
        Self {
            database,
            provider,
            clock,
            instrument,
        }
    }

    /// Runs the pass. A process failure or a missing namespace result aborts it;
    /// namespace rejections are collected and reconciliation carries on.
    pub fn execute(&self) -> Result<(), BootstrapError> {
        let outcome = self.run();
        let metric = if outcome.is_ok() {
            PASS_SUCCESS_METRIC
        } else {
            PASS_FAILURE_METRIC
        };
        self.instrument.inc(metric);
        outcome
    }

    fn run(&self) -> Result<(), BootstrapError> {
        // A fresh process per pass: processes may hold state from their own run.
        let mut process = self.provider.provide().map_err(BootstrapError::Provide)?;
        let namespaces = self
            .database
            .owned_namespaces()
            .map_err(BootstrapError::OwnedNamespaces)?;

        let targets = build_targets(&namespaces);
        let shards = targets.unique_shards;
        let start = self.clock.now();
        info!(
            "event=bootstrap_pass_started shards={} namespaces={}",
            shards,
            namespaces.len()
        );

        let outcome = process.run(start, targets.namespaces);
        let duration = self
            .clock
            .now()
            .duration_since(start)
            .unwrap_or_default();

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                error!(
                    "event=bootstrap_pass_failed shards={} duration={:?} error={}",
                    shards, duration, err
                );
                return Err(BootstrapError::Process(err));
            }
        };

        let mut failures = MultiError::new();
        for namespace in &namespaces {
            let id = namespace.id();
            let Some(namespace_result) = result.get(id) else {
                let err = BootstrapError::MissingNamespaceResult {
                    namespace: id.clone(),
                };
                self.instrument.emit_and_log_invariant_violation(|| {
                    error!(
                        "event=invariant_violated phase=bootstrap_reconcile shards={} duration={:?} error={}",
                        shards, duration, err
                    )
                });
                return Err(err);
            };

            if let Err(source) = namespace.bootstrap(namespace_result.clone()) {
                failures.add(BootstrapError::Namespace {
                    namespace: id.clone(),
                    source,
                });
            }
        }

        if let Err(err) = failures.into_result() {
            warn!(
                "event=bootstrap_namespaces_failed shards={} duration={:?} error={}",
                shards, duration, err
            );
            return Err(err);
        }

        info!(
            "event=bootstrap_pass_succeeded shards={} duration={:?}",
            shards, duration
        );
        Ok(())
    }
}
