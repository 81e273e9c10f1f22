use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use ssc_core::Setting;

use crate::error::{io_err, DaemonError};

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Debounce entries older than this are forgotten.
pub const DEBOUNCE_RETENTION: Duration = Duration::from_secs(30);

/// Queued regenerations per setting before trigger handlers wait.
pub const LANE_CAPACITY: usize = 64;

/// Create the output root and staging directory for `setting` and return the
/// staging directory's canonical path.
pub fn ensure_staging_dir(setting: &Setting) -> Result<PathBuf, DaemonError> {
    let staging = setting
        .output
        .staging_dir()
        .ok_or_else(|| DaemonError::StagingDisabled {
            setting: setting.name.to_string(),
        })?;
    if !setting.output.root.exists() {
        fs::create_dir_all(&setting.output.root).map_err(|e| io_err(&setting.output.root, e))?;
    }
    if !staging.exists() {
        fs::create_dir_all(&staging).map_err(|e| io_err(&staging, e))?;
    }
    // Notify reports real paths (e.g. /private/var on macOS).
    Ok(fs::canonicalize(&staging).unwrap_or(staging))
}
