//! Version bundle: one upgrade script concatenating a version's fragments.
//!
//! ```text
//! <root>/<version>/<procs>/*.sql      ┐
//! <root>/<version>/<functions>/*.sql  ┴─▶ <root>/<version>/<name> Upgrade <version> - 3 Objects.sql
//! ```
//!
//! The bundle is rebuilt from scratch on every call. Procedures come first,
//! then functions; files within a directory are ordered by file name.

use std::path::{Path, PathBuf};

use ssc_core::{Category, Setting};
use ssc_renderer::Renderer;

use crate::error::{io_err, SyncError};
use crate::fingerprint::sanitize_file_name;
use crate::writer::atomic_write;

/// Label passed to the audit header.
pub const BUNDLE_LABEL: &str = "Object";

/// Separator between bundle entries.
pub const BUNDLE_SEPARATOR: &str = "\n\n\n\n";

/// Categories merged into the bundle, in order.
pub const BUNDLE_CATEGORIES: &[Category] = &[Category::Procs, Category::Functions];

/// Outcome of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub path: PathBuf,
    pub fragments: usize,
}

/// `<root>/<version>/<name> Upgrade <version> - 3 Objects.sql`
pub fn bundle_path(setting: &Setting, version: &str) -> PathBuf {
    let file_name = format!("{} Upgrade {} - 3 Objects.sql", setting.name, version);
    setting
        .output
        .root
        .join(version)
        .join(sanitize_file_name(&file_name))
}

/// Rebuild the bundle for `version`.
pub fn merge_version(
    setting: &Setting,
    renderer: &Renderer,
    version: &str,
) -> Result<MergeReport, SyncError> {
    let version_dir = setting.output.root.join(version);
    let header = renderer.render_audit_header(&setting.name.0, version, BUNDLE_LABEL)?;
    let mut entries = vec![header.trim_end().to_string()];
    let mut fragments = 0;

    for category in BUNDLE_CATEGORIES {
        let Some(subpath) = setting.output.target(*category).subpath() else {
            continue;
        };
        let dir = version_dir.join(subpath);
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        for path in list_fragments(&dir)? {
            let content = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            entries.push(content);
            fragments += 1;
        }
    }

    let path = bundle_path(setting, version);
    let bundle = setting.line_ending.apply(&entries.join(BUNDLE_SEPARATOR));
    atomic_write(&path, &bundle)?;
    tracing::info!(path = %path.display(), fragments, "merged version bundle");
    Ok(MergeReport { path, fragments })
}

/// `*.sql` files directly inside `dir`, sorted by file name.
fn list_fragments(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_err(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
