//! Contract with the background maintenance scheduler (flush, snapshot, cleanup).

use log::debug;

/// Pauses and resumes background disk maintenance.
///
/// `enable_file_ops` must tolerate being called when file operations were never
/// disabled.
pub trait Mediator: Send + Sync {
    fn disable_file_ops(&self);
    fn enable_file_ops(&self);
}

/// Keeps file operations disabled for as long as the guard lives.
///
/// Dropping the guard, including while unwinding, re-enables them exactly once.
#[must_use = "file operations are re-enabled as soon as the guard is dropped"]
pub struct FileOpsGuard<'a> {
    mediator: &'a dyn Mediator,
}

impl<'a> FileOpsGuard<'a> {
    pub fn new(mediator: &'a dyn Mediator) -> Self {
        debug!("event=file_ops_disabled");
        mediator.disable_file_ops();
        Self { mediator }
    }
}

impl Drop for FileOpsGuard<'_> {
    fn drop(&mut self) {
        self.mediator.enable_file_ops();
        debug!("event=file_ops_enabled");
    }
}
