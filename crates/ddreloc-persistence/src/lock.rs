//! Exclusive lock on a working directory.

use crate::error::{PersistenceError, PersistenceResult};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOCK_FILE_NAME: &str = ".ddreloc.lock";

/// Held for the duration of a run; the lock file is removed on drop.
#[derive(Debug)]
pub struct WorkdirLock {
    path: PathBuf,
}

impl WorkdirLock {
    /// Create the lock file. Fails with `Locked` if it already exists.
    pub fn acquire(workdir: impl AsRef<Path>) -> PersistenceResult<Self> {
        let path = workdir.as_ref().join(LOCK_FILE_NAME);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PersistenceError::Locked(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "Acquired working directory lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkdirLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(?e, path = %self.path.display(), "Failed to remove lock file");
        }
    }
}
