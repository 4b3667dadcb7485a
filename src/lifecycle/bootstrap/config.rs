use crate::observability::{Instrument, SharedMetricsRegistry};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const PANIC_ON_INVARIANT_VIOLATED_ENV: &str = "PANIC_ON_INVARIANT_VIOLATED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Prefix for every metric the manager emits.
    pub metrics_namespace: String,
    /// Turn invariant violations (e.g. a process omitting a namespace) into panics.
    pub panic_on_invariant_violation: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            metrics_namespace: "dbnode".into(),
            panic_on_invariant_violation: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid bootstrap config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl BootstrapConfig {
    /// Loads a JSON config file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(
                    "event=bootstrap_config_defaulted path={}",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var(PANIC_ON_INVARIANT_VIOLATED_ENV).ok();
        self.with_panic_override(value.as_deref())
    }

    fn with_panic_override(mut self, value: Option<&str>) -> Self {
        if let Some(enabled) = value.and_then(parse_flag) {
            self.panic_on_invariant_violation = enabled;
        }
        self
    }

    pub fn instrument(&self) -> Instrument {
        Instrument::new(SharedMetricsRegistry::new(self.metrics_namespace.clone()))
            .with_panic_on_invariant_violation(self.panic_on_invariant_violation)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
