//! Advisory lock serialising check-then-start sequences across processes.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;
use tracing::{debug, warn};

use super::PROCESS_TARGET;
use super::errors::StartError;

/// Exclusive hold on the start lock; released when dropped.
///
/// The lock file itself is never deleted so every process contends on the
/// same inode.
#[derive(Debug)]
pub(super) struct StartLock {
    file: File,
}

impl StartLock {
    /// Blocks until the exclusive lock on `path` is held.
    pub(super) fn acquire(path: &Path) -> Result<Self, StartError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StartError::RuntimeDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let lock_error = |source: io::Error| StartError::Lock {
            path: path.to_path_buf(),
            source,
        };
        let file = options.open(path).map_err(lock_error)?;
        file.lock_exclusive().map_err(lock_error)?;
        debug!(target: PROCESS_TARGET, file = %path.display(), "start lock held");
        Ok(Self { file })
    }
}

impl Drop for StartLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!(
                target: PROCESS_TARGET,
                error = %error,
                "failed to release start lock"
            );
        }
    }
}
