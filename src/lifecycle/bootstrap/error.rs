use super::process::ProcessError;
use crate::storage::{NamespaceId, StorageError};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BootstrapError {
    /// A run was already in flight; this request was folded into it.
    #[error("database bootstrapping enqueued bootstrap")]
    Enqueued,
    #[error("unable to provide bootstrap process: {0}")]
    Provide(#[source] ProcessError),
    #[error("unable to list owned namespaces: {0}")]
    OwnedNamespaces(#[source] StorageError),
    #[error("bootstrap process failed: {0}")]
    Process(#[source] ProcessError),
    #[error("namespace {namespace} bootstrap failed: {source}")]
    Namespace {
        namespace: NamespaceId,
        #[source]
        source: StorageError,
    },
    #[error("missing namespace from bootstrap result: {namespace}")]
    MissingNamespaceResult { namespace: NamespaceId },
    #[error(transparent)]
    Multi(#[from] MultiError),
}

impl BootstrapError {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, BootstrapError::Enqueued)
    }

    /// True when this error, or any error it combines, is a collaborator contract
    /// breach rather than an ordinary failure.
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            BootstrapError::MissingNamespaceResult { .. } => true,
            BootstrapError::Multi(multi) => multi.iter().any(BootstrapError::is_invariant_violation),
            _ => false,
        }
    }
}

/// Ordered collection of independently raised errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiError {
    errors: Vec<BootstrapError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `err`. Combined errors are flattened so every leaf keeps its position.
    pub fn add(&mut self, err: BootstrapError) {
        match err {
            BootstrapError::Multi(multi) => self.errors.extend(multi.errors),
            other => self.errors.push(other),
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BootstrapError> {
        self.errors.iter()
    }

    /// `Ok` when empty, the lone error when there is one, the combination otherwise.
    pub fn into_result(mut self) -> Result<(), BootstrapError> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(BootstrapError::Multi(self)),
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl IntoIterator for MultiError {
    type Item = BootstrapError;
    type IntoIter = std::vec::IntoIter<BootstrapError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
