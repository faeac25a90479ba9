// src/lock.rs

//! Exclusive lock on the smelt root
//!
//! Every write-path command (`init`, `update`, `install`, `upgrade`,
//! `remove`, `upload`, `remote add/rm`, `switch`) holds this lock for its
//! whole duration. Read-only commands do not take it, so a reader racing
//! a writer may observe an intermediate state; that is acceptable for
//! query output. Two writers serialize on `flock`.

use crate::error::Result;
use crate::paths::Layout;
use fs2::FileExt;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::debug;

/// Held for the duration of a write command; released on drop.
pub struct RootLock {
    file: File,
    path: PathBuf,
}

impl RootLock {
    /// Acquire the lock, blocking until available.
    pub fn acquire(layout: &Layout) -> Result<Self> {
        fs::create_dir_all(layout.root())?;
        let path = layout.lock_file();
        let file = File::create(&path)?;
        file.lock_exclusive()?;
        debug!("acquired root lock at {}", path.display());
        Ok(RootLock { file, path })
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        debug!("released root lock at {}", self.path.display());
    }
}
