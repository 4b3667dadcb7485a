use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BootstrapState {
    #[default]
    NotBootstrapped,
    Bootstrapping,
    Bootstrapped,
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BootstrapState::NotBootstrapped => "not_bootstrapped",
            BootstrapState::Bootstrapping => "bootstrapping",
            BootstrapState::Bootstrapped => "bootstrapped",
        };
        f.write_str(label)
    }
}
