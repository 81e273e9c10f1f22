//! Output reconciliation: classify, write, and prune artifacts for one run.
//!
//! ## Lifecycle
//!
//! 1. `new` scans every `*.sql` under each enabled category of each managed
//!    tree (the baseline) and loads the fingerprint cache.
//! 2. `write` classifies one artifact as added / updated / unchanged, writes it
//!    atomically, and removes it from the baseline.
//! 3. `finalize` deletes what is left of the baseline (full runs only),
//!    persists the cache, and returns the stats.
//!
//! Disabled categories are never scanned, written, or pruned.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ssc_core::{Category, CategoryTarget, LineEnding, OutputConfig, Setting};
use walkdir::WalkDir;

use crate::cache::{cache_path_at, FingerprintCache};
use crate::error::SyncError;
use crate::fingerprint::{fingerprint, normalize_key, sanitize_file_name};
use crate::writer::atomic_write;

/// Category → output target for the categories a reconciler manages.
pub type CategoryMap = BTreeMap<Category, CategoryTarget>;

/// Targets from `output` for `categories`.
pub fn category_map(output: &OutputConfig, categories: &[Category]) -> CategoryMap {
    categories
        .iter()
        .map(|c| (*c, output.target(*c).clone()))
        .collect()
}

/// A category layout under the output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tree {
    /// `<root>/<category>/`
    Current,
    /// `<root>/<version>/<category>/`
    Version(String),
}

impl Tree {
    pub fn dir(&self, root: &Path) -> PathBuf {
        match self {
            Tree::Current => root.to_path_buf(),
            Tree::Version(version) => root.join(version),
        }
    }
}

/// How much of the artifact set a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every artifact is written; leftovers are pruned and the cache rebuilt.
    Full,
    /// A subset is written; nothing is pruned and other cache entries survive.
    Targeted,
}

/// Outcome of a single `write`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Added { path: PathBuf },
    Updated { path: PathBuf },
    Unchanged { path: PathBuf },
    /// The category is disabled; nothing happened.
    Disabled,
}

/// Counters for one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl fmt::Display for ReconciliationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added {}, updated {}, and removed {} files",
            self.added, self.updated, self.removed
        )
    }
}

/// Owns the baseline, the cache, and the stats of one run or watch event.
#[derive(Debug)]
pub struct OutputReconciler {
    root: PathBuf,
    categories: CategoryMap,
    mode: Mode,
    line_ending: LineEnding,
    cache: FingerprintCache,
    /// key → path of artifacts found on disk and not yet rewritten.
    baseline: BTreeMap<String, PathBuf>,
    /// Key prefixes (`procs/`, `1.0/procs/`) of the managed directories.
    managed: Vec<String>,
    stats: ReconciliationStats,
}

impl OutputReconciler {
    pub fn new(
        root: impl Into<PathBuf>,
        categories: CategoryMap,
        trees: &[Tree],
        mode: Mode,
        cache_path: impl Into<PathBuf>,
        line_ending: LineEnding,
    ) -> Self {
        let root = root.into();
        let mut baseline = BTreeMap::new();
        let mut managed = Vec::new();

        for tree in trees {
            for subpath in categories.values().filter_map(CategoryTarget::subpath) {
                let dir = tree.dir(&root).join(subpath);
                managed.push(format!("{}/", normalize_key(&root, &dir)));
                scan_artifacts(&root, &dir, &mut baseline);
            }
        }

        let cache = FingerprintCache::load(cache_path);
        tracing::debug!(
            root = %root.display(),
            baseline = baseline.len(),
            ?mode,
            "reconciler ready"
        );
        Self {
            root,
            categories,
            mode,
            line_ending,
            cache,
            baseline,
            managed,
            stats: ReconciliationStats::default(),
        }
    }

    /// Reconciler for `setting` with its cache at `<root>/.ssc/<name>.json`.
    pub fn for_setting(setting: &Setting, categories: &[Category], trees: &[Tree], mode: Mode) -> Self {
        let root = setting.output.root.clone();
        let cache_path = cache_path_at(&root, &setting.name.0);
        Self::new(
            root,
            category_map(&setting.output, categories),
            trees,
            mode,
            cache_path,
            setting.line_ending,
        )
    }

    pub fn stats(&self) -> ReconciliationStats {
        self.stats
    }

    /// Paths still scheduled for removal at `finalize`.
    pub fn pending_removals(&self) -> impl Iterator<Item = &Path> {
        self.baseline.values().map(PathBuf::as_path)
    }

    /// Target path for an artifact, or `None` if the category is disabled.
    pub fn target_path(&self, tree: &Tree, category: Category, name: &str) -> Option<PathBuf> {
        let subpath = self.categories.get(&category)?.subpath()?;
        Some(tree.dir(&self.root).join(subpath).join(sanitize_file_name(name)))
    }

    /// Write one artifact.
    ///
    /// On write failure the path is still kept out of pruning and its previous
    /// fingerprint is carried into the new cache.
    pub fn write(
        &mut self,
        tree: &Tree,
        category: Category,
        name: &str,
        content: &str,
    ) -> Result<WriteOutcome, SyncError> {
        let Some(path) = self.target_path(tree, category, name) else {
            tracing::trace!(%category, artifact = name, "category disabled; skipping");
            return Ok(WriteOutcome::Disabled);
        };
        let key = normalize_key(&self.root, &path);
        let bytes = self.line_ending.apply(content.trim());
        let digest = fingerprint(content);

        let in_baseline = self.baseline.remove(&key).is_some();
        let is_new = !in_baseline || !self.cache.is_tracked(&key);
        let changed = self.cache.did_change(&key, &digest);

        if let Err(e) = atomic_write(&path, &bytes) {
            self.cache.carry_forward(&key);
            return Err(e);
        }
        self.cache.add(key, digest);

        let outcome = if is_new {
            self.stats.added += 1;
            tracing::debug!(path = %path.display(), "added");
            WriteOutcome::Added { path }
        } else if changed {
            self.stats.updated += 1;
            tracing::debug!(path = %path.display(), "updated");
            WriteOutcome::Updated { path }
        } else {
            tracing::trace!(path = %path.display(), "unchanged");
            WriteOutcome::Unchanged { path }
        };
        Ok(outcome)
    }

    /// Keep an existing artifact as-is: it is not pruned and keeps its cache entry.
    ///
    /// Used when an object could not be rendered this run.
    pub fn retain(&mut self, tree: &Tree, category: Category, name: &str) {
        if let Some(path) = self.target_path(tree, category, name) {
            let key = normalize_key(&self.root, &path);
            self.baseline.remove(&key);
            self.cache.carry_forward(&key);
        }
    }

    /// Prune leftovers (full mode), persist the cache, and return the stats.
    ///
    /// Failed deletions and a failed cache write are logged; they do not fail the run.
    pub fn finalize(mut self) -> ReconciliationStats {
        match self.mode {
            Mode::Full => {
                for path in std::mem::take(&mut self.baseline).into_values() {
                    match std::fs::remove_file(&path) {
                        Ok(()) => {
                            self.stats.removed += 1;
                            tracing::debug!(path = %path.display(), "removed");
                        }
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "failed to remove stale artifact");
                        }
                    }
                }
                let managed = &self.managed;
                self.cache
                    .carry_forward_where(|key| !managed.iter().any(|prefix| key.starts_with(prefix)));
            }
            Mode::Targeted => {
                self.cache.carry_forward_where(|_| true);
            }
        }

        if let Err(e) = self.cache.write() {
            tracing::error!(path = %self.cache.path().display(), error = %e, "failed to persist fingerprint cache");
        }
        self.stats
    }
}

fn scan_artifacts(root: &Path, dir: &Path, baseline: &mut BTreeMap<String, PathBuf>) {
    if !dir.is_dir() {
        return;
    }
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_sql(entry.path()) {
            continue;
        }
        let path = entry.into_path();
        baseline.insert(normalize_key(root, &path), path);
    }
}

fn is_sql(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sql"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn procs_only(root: &Path) -> OutputReconciler {
        let mut categories = CategoryMap::new();
        categories.insert(Category::Procs, CategoryTarget::enabled("procs"));
        categories.insert(Category::Views, CategoryTarget::Disabled);
        OutputReconciler::new(
            root,
            categories,
            &[Tree::Current],
            Mode::Full,
            cache_path_at(root, "dev"),
            LineEnding::Lf,
        )
    }

    #[test]
    fn stats_display_reads_as_sentence() {
        let stats = ReconciliationStats { added: 1, updated: 2, removed: 3 };
        assert_eq!(stats.to_string(), "added 1, updated 2, and removed 3 files");
    }

    #[test]
    fn disabled_category_write_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut rec = procs_only(dir.path());
        let outcome = rec.write(&Tree::Current, Category::Views, "v.sql", "SELECT 1").unwrap();
        assert_eq!(outcome, WriteOutcome::Disabled);
        let outcome = rec.write(&Tree::Current, Category::Jobs, "j.sql", "SELECT 1").unwrap();
        assert_eq!(outcome, WriteOutcome::Disabled);
        assert_eq!(rec.finalize(), ReconciliationStats::default());
    }

    #[test]
    fn non_sql_files_are_not_in_baseline() {
        let dir = TempDir::new().unwrap();
        let procs = dir.path().join("procs");
        std::fs::create_dir_all(&procs).unwrap();
        std::fs::write(procs.join("README.md"), "notes").unwrap();
        std::fs::write(procs.join("a.sql.ssc.tmp"), "partial").unwrap();
        std::fs::write(procs.join("old.SQL"), "x").unwrap();

        let rec = procs_only(dir.path());
        let pending: Vec<_> = rec.pending_removals().collect();
        assert_eq!(pending, vec![procs.join("old.SQL").as_path()]);
    }

    #[test]
    fn write_applies_line_ending_and_trims() {
        let dir = TempDir::new().unwrap();
        let mut categories = CategoryMap::new();
        categories.insert(Category::Procs, CategoryTarget::enabled("procs"));
        let mut rec = OutputReconciler::new(
            dir.path(),
            categories,
            &[Tree::Current],
            Mode::Full,
            cache_path_at(dir.path(), "dev"),
            LineEnding::Crlf,
        );
        rec.write(&Tree::Current, Category::Procs, "a.sql", "\nSELECT 1\nGO\n\n").unwrap();
        let bytes = std::fs::read_to_string(dir.path().join("procs/a.sql")).unwrap();
        assert_eq!(bytes, "SELECT 1\r\nGO");
    }

    #[test]
    fn unsafe_names_are_sanitized() {
        let dir = TempDir::new().unwrap();
        let mut rec = procs_only(dir.path());
        let outcome = rec.write(&Tree::Current, Category::Procs, "a/b?.sql", "SELECT 1").unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Added { path: dir.path().join("procs").join("a!b!.sql") }
        );
    }

    #[test]
    fn retained_paths_survive_full_finalize() {
        let dir = TempDir::new().unwrap();
        let procs = dir.path().join("procs");
        std::fs::create_dir_all(&procs).unwrap();
        std::fs::write(procs.join("keep.sql"), "x").unwrap();
        std::fs::write(procs.join("drop.sql"), "y").unwrap();

        let mut rec = procs_only(dir.path());
        rec.retain(&Tree::Current, Category::Procs, "keep.sql");
        let stats = rec.finalize();
        assert_eq!(stats.removed, 1);
        assert!(procs.join("keep.sql").exists());
        assert!(!procs.join("drop.sql").exists());
    }
}
