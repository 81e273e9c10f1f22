//! Batch pull, single-object regeneration, and version bundles.

use std::fs;
use std::path::Path;

use assert_fs::prelude::*;
use predicates::prelude::*;
use ssc_core::{
    CatalogSnapshot, Setting, SqlColumn, SqlDataResult, SqlJob, SqlObject, SqlPermission,
    SqlTable, SqlType, SqlValue,
};
use ssc_renderer::Renderer;
use ssc_sync::{bundle_path, merge_version, pull, regenerate, ReconciliationStats};

fn setting(root: &Path, functions: serde_json::Value) -> Setting {
    serde_json::from_value(serde_json::json!({
        "name": "dev",
        "connection": { "server": "localhost", "database": "app" },
        "output": {
            "root": root,
            "schemas": "./schemas",
            "procs": "./procs",
            "views": "./views",
            "functions": functions,
            "triggers": false,
            "tables": "./tables"
        },
        "currentVersion": "2.1.0"
    }))
    .expect("setting")
}

fn object(schema: &str, name: &str, code: &str, text: &str) -> SqlObject {
    SqlObject { schema: schema.into(), name: name.into(), type_code: code.into(), text: text.into() }
}

fn snapshot() -> CatalogSnapshot {
    CatalogSnapshot {
        objects: vec![
            object("dbo", "usp_GetUser", "P ", "CREATE PROCEDURE dbo.usp_GetUser AS SELECT 1"),
            object("dbo", "vw_Users", "V ", "CREATE VIEW dbo.vw_Users AS SELECT 1 AS x"),
            object("rpt", "fn_Total", "FN", "CREATE FUNCTION rpt.fn_Total() RETURNS int AS BEGIN RETURN 1 END"),
            object("dbo", "Users", "U ", ""),
        ],
        permissions: vec![SqlPermission {
            schema: "dbo".into(),
            name: "usp_GetUser".into(),
            state: "GRANT".into(),
            permission: "EXECUTE".into(),
            grantee: "app_role".into(),
        }],
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// 1. Pull
// ---------------------------------------------------------------------------

#[test]
fn pull_writes_layout_and_skips_unsupported_rows() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), "./functions".into());
    let renderer = Renderer::new().expect("renderer");

    let report = pull(&setting, &renderer, &snapshot()).expect("pull");
    assert_eq!(report.stats, ReconciliationStats { added: 5, updated: 0, removed: 0 });
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);

    root.child("procs/usp_GetUser.sql")
        .assert(predicate::str::contains("GRANT EXECUTE ON [dbo].[usp_GetUser] TO [app_role]"));
    root.child("views/dbo.vw_Users.sql").assert(predicate::path::exists());
    root.child("functions/rpt.fn_Total.sql").assert(predicate::path::exists());
    root.child("schemas/dbo.sql").assert(predicate::path::exists());
    root.child("schemas/rpt.sql").assert(predicate::path::exists());
}

#[test]
fn pull_prunes_dropped_objects_but_not_unmanaged_categories() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), "./functions".into());
    let renderer = Renderer::new().expect("renderer");
    root.child("triggers/dbo.trg_Audit.sql").write_str("CREATE TRIGGER").expect("seed");
    pull(&setting, &renderer, &snapshot()).expect("pull");

    let mut next = snapshot();
    next.objects.retain(|o| o.name != "vw_Users");
    let report = pull(&setting, &renderer, &next).expect("pull");
    assert_eq!(report.stats, ReconciliationStats { added: 0, updated: 0, removed: 1 });

    root.child("views/dbo.vw_Users.sql").assert(predicate::path::missing());
    root.child("triggers/dbo.trg_Audit.sql").assert(predicate::path::exists());
}

fn schema_setting(root: &Path) -> Setting {
    serde_json::from_value(serde_json::json!({
        "name": "dev",
        "connection": { "server": "localhost", "database": "app" },
        "output": {
            "root": root,
            "schemas": "./schemas",
            "tables": "./tables",
            "types": "./types",
            "data": "./data",
            "jobs": "./jobs"
        },
        "data": ["dbo.Status"],
        "currentVersion": "2.1.0"
    }))
    .expect("setting")
}

fn schema_snapshot() -> CatalogSnapshot {
    let rows = |name: &str| SqlDataResult {
        schema: "dbo".into(),
        name: name.into(),
        columns: vec!["Id".into()],
        rows: vec![vec![SqlValue::Int(1)]],
        has_identity: false,
    };
    CatalogSnapshot {
        tables: vec![
            SqlTable { object_id: 1, schema: "dbo".into(), name: "Status".into() },
            SqlTable { object_id: 2, schema: "sales".into(), name: "Orders".into() },
        ],
        columns: vec![
            SqlColumn { object_id: 1, name: "Id".into(), datatype: "int".into(), ..Default::default() },
            SqlColumn { object_id: 2, name: "Id".into(), datatype: "int".into(), ..Default::default() },
        ],
        types: vec![SqlType {
            schema: "dbo".into(),
            name: "Code".into(),
            system_type: "varchar".into(),
            max_length: 10,
            precision: 0,
            scale: 0,
            is_nullable: true,
            type_code: None,
            object_id: None,
        }],
        data: vec![rows("Status"), rows("Unlisted")],
        jobs: vec![SqlJob {
            job_id: "J1".into(),
            name: "Nightly".into(),
            enabled: true,
            description: None,
        }],
        ..Default::default()
    }
}

#[test]
fn pull_writes_tables_types_data_and_jobs() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = schema_setting(root.path());
    let renderer = Renderer::new().expect("renderer");

    let report = pull(&setting, &renderer, &schema_snapshot()).expect("pull");
    // 2 schemas, 2 tables, 1 type, 1 data script, 1 job
    assert_eq!(report.stats, ReconciliationStats { added: 7, updated: 0, removed: 0 });
    assert_eq!(report.failed, 0);

    root.child("schemas/sales.sql").assert(predicate::path::exists());
    root.child("tables/dbo.Status.sql")
        .assert(predicate::str::contains("CREATE TABLE [dbo].[Status] (\n    [Id] [int] NOT NULL\n)"));
    root.child("tables/sales.Orders.sql").assert(predicate::path::exists());
    root.child("types/dbo.Code.sql")
        .assert(predicate::str::contains("CREATE TYPE [dbo].[Code] FROM [varchar](10) NULL"));
    root.child("data/dbo.Status.sql")
        .assert(predicate::str::contains("INSERT INTO [dbo].[Status] ([Id]) VALUES (1)"));
    root.child("data/dbo.Unlisted.sql").assert(predicate::path::missing());
    root.child("jobs/Nightly.sql").assert(predicate::str::contains("sp_add_job @job_name = N'Nightly'"));

    let again = pull(&setting, &renderer, &schema_snapshot()).expect("pull");
    assert_eq!(again.stats, ReconciliationStats::default());

    let mut next = schema_snapshot();
    next.tables.retain(|t| t.name != "Orders");
    next.jobs.clear();
    let report = pull(&setting, &renderer, &next).expect("pull");
    // table, job, and the now-empty sales schema
    assert_eq!(report.stats, ReconciliationStats { added: 0, updated: 0, removed: 3 });
    root.child("tables/sales.Orders.sql").assert(predicate::path::missing());
    root.child("jobs/Nightly.sql").assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 2. Regenerate
// ---------------------------------------------------------------------------

#[test]
fn regenerate_writes_both_trees_and_bundle() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), "./functions".into());
    let renderer = Renderer::new().expect("renderer");
    let snap = snapshot();

    let report = regenerate(&setting, &renderer, &snap.objects[0], &snap.permissions).expect("regenerate");
    assert_eq!(report.stats, ReconciliationStats { added: 2, updated: 0, removed: 0 });
    assert_eq!(report.merge.fragments, 1);

    let flat = fs::read_to_string(root.path().join("procs/usp_GetUser.sql")).expect("flat");
    let versioned = fs::read_to_string(root.path().join("2.1.0/procs/usp_GetUser.sql")).expect("versioned");
    assert_eq!(flat, versioned);

    let bundle = root.child("2.1.0/dev Upgrade 2.1.0 - 3 Objects.sql");
    bundle.assert(predicate::str::starts_with("/*\n * dev Upgrade 2.1.0"));
    bundle.assert(predicate::str::contains(format!("\n\n\n\n{flat}")));
}

#[test]
fn regenerate_reports_update_on_changed_definition() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), "./functions".into());
    let renderer = Renderer::new().expect("renderer");
    let snap = snapshot();
    regenerate(&setting, &renderer, &snap.objects[0], &snap.permissions).expect("first");

    let changed = object("dbo", "usp_GetUser", "P", "CREATE PROCEDURE dbo.usp_GetUser AS SELECT 2");
    let report = regenerate(&setting, &renderer, &changed, &snap.permissions).expect("second");
    assert_eq!(report.stats, ReconciliationStats { added: 0, updated: 2, removed: 0 });

    let again = regenerate(&setting, &renderer, &changed, &snap.permissions).expect("third");
    assert_eq!(again.stats, ReconciliationStats::default());
}

#[test]
fn regenerate_rejects_unsupported_type() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), "./functions".into());
    let renderer = Renderer::new().expect("renderer");
    let table = object("dbo", "Users", "U", "");
    assert!(regenerate(&setting, &renderer, &table, &[]).is_err());
    root.child("2.1.0").assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 3. Merge
// ---------------------------------------------------------------------------

#[test]
fn merge_orders_procs_then_functions_by_file_name() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), "./functions".into());
    let renderer = Renderer::new().expect("renderer");
    root.child("2.1.0/procs/b.sql").write_str("PROC B").expect("seed");
    root.child("2.1.0/procs/a.sql").write_str("PROC A").expect("seed");
    root.child("2.1.0/procs/notes.txt").write_str("ignored").expect("seed");
    root.child("2.1.0/functions/a.sql").write_str("FUNC A").expect("seed");

    let report = merge_version(&setting, &renderer, "2.1.0").expect("merge");
    assert_eq!(report.fragments, 3);
    assert_eq!(report.path, bundle_path(&setting, "2.1.0"));

    let bundle = fs::read_to_string(&report.path).expect("bundle");
    let body = bundle.split_once("\n\n\n\n").map(|(_, rest)| rest).expect("separator");
    assert_eq!(body, "PROC A\n\n\n\nPROC B\n\n\n\nFUNC A");
}

#[test]
fn merge_is_byte_identical_on_repeat() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), "./functions".into());
    let renderer = Renderer::new().expect("renderer");
    root.child("2.1.0/procs/a.sql").write_str("PROC A").expect("seed");

    let first = merge_version(&setting, &renderer, "2.1.0").expect("merge");
    let bytes = fs::read(&first.path).expect("read");
    merge_version(&setting, &renderer, "2.1.0").expect("merge");
    assert_eq!(fs::read(&first.path).expect("read"), bytes);
}

#[test]
fn merge_with_functions_disabled_creates_only_procs_dir() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let setting = setting(root.path(), false.into());
    let renderer = Renderer::new().expect("renderer");

    let report = merge_version(&setting, &renderer, "2.1.0").expect("merge");
    assert_eq!(report.fragments, 0);
    root.child("2.1.0/procs").assert(predicate::path::is_dir());
    root.child("2.1.0/functions").assert(predicate::path::missing());
}
