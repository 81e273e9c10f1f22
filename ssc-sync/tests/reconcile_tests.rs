//! Reconciliation scenarios: fresh runs, incremental runs, lost cache, and
//! disabled categories.

use std::fs;
use std::path::Path;

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use ssc_core::{Category, CategoryTarget, LineEnding};
use ssc_sync::cache::cache_path_at;
use ssc_sync::{CategoryMap, Mode, OutputReconciler, ReconciliationStats, Tree, WriteOutcome};

fn categories() -> CategoryMap {
    let mut map = CategoryMap::new();
    map.insert(Category::Procs, CategoryTarget::enabled("procs"));
    map.insert(Category::Views, CategoryTarget::Disabled);
    map
}

fn reconciler(root: &Path) -> OutputReconciler {
    OutputReconciler::new(
        root,
        categories(),
        &[Tree::Current],
        Mode::Full,
        cache_path_at(root, "dev"),
        LineEnding::Lf,
    )
}

fn stats(added: usize, updated: usize, removed: usize) -> ReconciliationStats {
    ReconciliationStats { added, updated, removed }
}

fn first_run(root: &Path) -> ReconciliationStats {
    let mut rec = reconciler(root);
    for (name, body) in [("a.sql", "SELECT 'a'"), ("b.sql", "SELECT 'b'"), ("c.sql", "SELECT 'c'")] {
        rec.write(&Tree::Current, Category::Procs, name, body).expect("write");
    }
    rec.finalize()
}

// ---------------------------------------------------------------------------
// 1. Fresh run
// ---------------------------------------------------------------------------

#[test]
fn empty_baseline_reports_every_write_as_added() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    assert_eq!(first_run(root.path()), stats(3, 0, 0));

    root.child("procs/a.sql").assert("SELECT 'a'");
    let cache = fs::read_to_string(cache_path_at(root.path(), "dev")).expect("cache");
    let doc: serde_json::Value = serde_json::from_str(&cache).expect("json");
    assert_eq!(doc["files"].as_object().map(|m| m.len()), Some(3));
    assert!(doc["files"].get("procs/a.sql").is_some(), "keys are root-relative: {cache}");
    assert!(doc["synced_at"].is_string());
}

// ---------------------------------------------------------------------------
// 2. Incremental run
// ---------------------------------------------------------------------------

#[test]
fn second_run_classifies_changed_dropped_unchanged_and_new() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());

    let mut rec = reconciler(root.path());
    let changed = rec.write(&Tree::Current, Category::Procs, "a.sql", "SELECT 'a2'").expect("write");
    let same = rec.write(&Tree::Current, Category::Procs, "b.sql", "SELECT 'b'").expect("write");
    let new = rec.write(&Tree::Current, Category::Procs, "d.sql", "SELECT 'd'").expect("write");
    assert!(matches!(changed, WriteOutcome::Updated { .. }), "got: {changed:?}");
    assert!(matches!(same, WriteOutcome::Unchanged { .. }), "got: {same:?}");
    assert!(matches!(new, WriteOutcome::Added { .. }), "got: {new:?}");

    assert_eq!(rec.finalize(), stats(1, 1, 1));
    root.child("procs/c.sql").assert(predicate::path::missing());
    root.child("procs/d.sql").assert(predicate::path::exists());
}

#[test]
fn identical_rerun_reports_nothing() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());
    assert_eq!(first_run(root.path()), stats(0, 0, 0));
}

#[test]
fn line_ending_only_change_is_unchanged() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());

    let mut rec = reconciler(root.path());
    let outcome = rec
        .write(&Tree::Current, Category::Procs, "a.sql", "  SELECT 'a'\r\n")
        .expect("write");
    assert!(matches!(outcome, WriteOutcome::Unchanged { .. }), "got: {outcome:?}");
}

// ---------------------------------------------------------------------------
// 3. Lost or corrupt cache
// ---------------------------------------------------------------------------

#[test]
fn deleted_cache_reports_every_path_added() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());
    fs::remove_file(cache_path_at(root.path(), "dev")).expect("rm cache");

    assert_eq!(first_run(root.path()), stats(3, 0, 0));
    assert_eq!(first_run(root.path()), stats(0, 0, 0), "cache is rebuilt");
}

#[test]
fn corrupt_cache_does_not_crash() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());
    fs::write(cache_path_at(root.path(), "dev"), "][").expect("corrupt");

    assert_eq!(first_run(root.path()), stats(3, 0, 0));
}

// ---------------------------------------------------------------------------
// 4. Disabled categories and pruning scope
// ---------------------------------------------------------------------------

#[test]
fn disabled_category_is_never_pruned() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("views/dbo.vw.sql").write_str("CREATE VIEW").expect("seed");
    root.child("procs/stale.sql").write_str("old").expect("seed");

    let mut rec = reconciler(root.path());
    let outcome = rec
        .write(&Tree::Current, Category::Views, "dbo.vw.sql", "CREATE VIEW v2")
        .expect("write");
    assert_eq!(outcome, WriteOutcome::Disabled);
    assert_eq!(rec.finalize(), stats(0, 0, 1));

    root.child("views/dbo.vw.sql").assert("CREATE VIEW");
    root.child("procs/stale.sql").assert(predicate::path::missing());
}

#[test]
fn unwritten_enabled_category_is_emptied() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());
    let rec = reconciler(root.path());
    assert_eq!(rec.finalize(), stats(0, 0, 3));
}

#[test]
fn targeted_mode_never_prunes_and_keeps_other_entries() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());

    let mut rec = OutputReconciler::new(
        root.path(),
        categories(),
        &[Tree::Current],
        Mode::Targeted,
        cache_path_at(root.path(), "dev"),
        LineEnding::Lf,
    );
    rec.write(&Tree::Current, Category::Procs, "a.sql", "SELECT 'a2'").expect("write");
    assert_eq!(rec.finalize(), stats(0, 1, 0));
    root.child("procs/b.sql").assert(predicate::path::exists());

    // b and c are still tracked, so an identical full run is a no-op for them.
    let mut rec = reconciler(root.path());
    rec.write(&Tree::Current, Category::Procs, "a.sql", "SELECT 'a2'").expect("write");
    rec.write(&Tree::Current, Category::Procs, "b.sql", "SELECT 'b'").expect("write");
    rec.write(&Tree::Current, Category::Procs, "c.sql", "SELECT 'c'").expect("write");
    assert_eq!(rec.finalize(), stats(0, 0, 0));
}

#[test]
fn full_run_keeps_cache_entries_of_other_trees() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let version = Tree::Version("1.0".to_string());
    let mut rec = OutputReconciler::new(
        root.path(),
        categories(),
        &[version.clone()],
        Mode::Targeted,
        cache_path_at(root.path(), "dev"),
        LineEnding::Lf,
    );
    rec.write(&version, Category::Procs, "a.sql", "SELECT 'a'").expect("write");
    rec.finalize();

    first_run(root.path());

    let mut rec = OutputReconciler::new(
        root.path(),
        categories(),
        &[version.clone()],
        Mode::Targeted,
        cache_path_at(root.path(), "dev"),
        LineEnding::Lf,
    );
    let outcome = rec.write(&version, Category::Procs, "a.sql", "SELECT 'a'").expect("write");
    assert!(matches!(outcome, WriteOutcome::Unchanged { .. }), "got: {outcome:?}");
    root.child("1.0/procs/a.sql").assert("SELECT 'a'");
}

// ---------------------------------------------------------------------------
// 5. Long names and failed writes
// ---------------------------------------------------------------------------

fn long_name() -> String {
    let name = format!("dbo.{}.sql", "x".repeat(112));
    assert_eq!(name.len(), 120);
    name
}

#[test]
fn long_name_rerun_is_unchanged() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let name = long_name();

    let mut rec = reconciler(root.path());
    let outcome = rec.write(&Tree::Current, Category::Procs, &name, "SELECT 1").expect("write");
    let WriteOutcome::Added { path } = outcome else {
        panic!("expected an added artifact, got: {outcome:?}");
    };
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("sql"));
    assert_eq!(rec.finalize(), stats(1, 0, 0));

    let mut rec = reconciler(root.path());
    rec.write(&Tree::Current, Category::Procs, &name, "SELECT 1").expect("write");
    assert_eq!(rec.finalize(), stats(0, 0, 0));
    assert!(path.exists());
}

#[test]
fn long_name_is_pruned_when_dropped() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let name = long_name();

    let mut rec = reconciler(root.path());
    let Ok(WriteOutcome::Added { path }) = rec.write(&Tree::Current, Category::Procs, &name, "SELECT 1")
    else {
        panic!("long name was not written");
    };
    rec.finalize();

    let rec = reconciler(root.path());
    assert_eq!(rec.finalize(), stats(0, 0, 1));
    assert!(!path.exists(), "{} should be pruned", path.display());
}

#[test]
fn failed_write_keeps_old_file_and_fingerprint() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    first_run(root.path());
    let cache_file = cache_path_at(root.path(), "dev");
    let before: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&cache_file).expect("cache")).expect("json");

    // A directory where the temp file goes makes the write fail.
    root.child("procs/a.sql.ssc.tmp").create_dir_all().expect("blocker");

    let mut rec = reconciler(root.path());
    let err = rec.write(&Tree::Current, Category::Procs, "a.sql", "SELECT 'a2'");
    assert!(err.is_err(), "write should fail: {err:?}");
    rec.write(&Tree::Current, Category::Procs, "b.sql", "SELECT 'b'").expect("write");
    rec.write(&Tree::Current, Category::Procs, "c.sql", "SELECT 'c'").expect("write");
    assert_eq!(rec.finalize(), stats(0, 0, 0));

    root.child("procs/a.sql").assert("SELECT 'a'");
    let after: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&cache_file).expect("cache")).expect("json");
    assert_eq!(after["files"]["procs/a.sql"], before["files"]["procs/a.sql"]);
    assert!(after["files"]["procs/a.sql"].is_string());

    fs::remove_dir(root.path().join("procs/a.sql.ssc.tmp")).expect("unblock");
    assert_eq!(first_run(root.path()), stats(0, 0, 0));
}
