//! Lifecycle utilities (node bootstrap).

pub mod bootstrap;

pub use bootstrap::*;
