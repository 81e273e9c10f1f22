//! Atomic file writes.
//!
//! 1. Create parent directories.
//! 2. Write to `<path>.ssc.tmp` in the same directory.
//! 3. Rename to the final path (atomic on POSIX).
//!
//! The temp file never ends in `.sql`, so a crashed write is never mistaken
//! for an artifact by a later baseline scan.

use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.ssc.tmp", path.display()))
}

/// Atomically replace `path` with `content`.
pub fn atomic_write(path: &Path, content: &str) -> Result<(), SyncError> {
    atomic_write_with_tmp(path, content, &tmp_path(path))
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}
