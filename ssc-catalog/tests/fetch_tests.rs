//! Session lifecycle, not-found, timeout, and export-directory behaviour.

use std::time::Duration;

use rstest::rstest;
use ssc_catalog::{
    fetch_object, fetch_snapshot, CatalogError, ExportCatalog, MemoryCatalog, SnapshotScope,
};
use ssc_core::{
    CatalogSnapshot, ObjectType, SqlDataResult, SqlJob, SqlObject, SqlPermission, SqlTable,
    SqlValue,
};
use tempfile::TempDir;

fn object(schema: &str, name: &str, code: &str, text: &str) -> SqlObject {
    SqlObject {
        schema: schema.into(),
        name: name.into(),
        type_code: code.into(),
        text: text.into(),
    }
}

fn grant(schema: &str, name: &str, grantee: &str) -> SqlPermission {
    SqlPermission {
        schema: schema.into(),
        name: name.into(),
        state: "GRANT".into(),
        permission: "EXECUTE".into(),
        grantee: grantee.into(),
    }
}

fn seeded() -> MemoryCatalog {
    MemoryCatalog::new(CatalogSnapshot {
        objects: vec![
            object("dbo", "usp_GetUser", "P ", "CREATE PROCEDURE dbo.usp_GetUser AS SELECT 1"),
            object("dbo", "vw_Users", "V ", "CREATE VIEW dbo.vw_Users AS SELECT 1 AS x"),
        ],
        permissions: vec![
            grant("dbo", "usp_GetUser", "app_role"),
            grant("dbo", "usp_Other", "app_role"),
            grant("audit", "usp_GetUser", "auditor"),
        ],
        tables: vec![
            table(1, "dbo", "Users"),
            table(2, "dbo", "Roles"),
        ],
        data: vec![rows("dbo", "Users"), rows("dbo", "Roles")],
        jobs: vec![SqlJob {
            job_id: "8c5f".into(),
            name: "Nightly".into(),
            enabled: true,
            description: None,
        }],
        ..Default::default()
    })
}

fn table(object_id: i32, schema: &str, name: &str) -> SqlTable {
    SqlTable { object_id, schema: schema.into(), name: name.into() }
}

fn rows(schema: &str, name: &str) -> SqlDataResult {
    SqlDataResult {
        schema: schema.into(),
        name: name.into(),
        columns: vec!["Id".into()],
        rows: vec![vec![SqlValue::Int(1)]],
        has_identity: false,
    }
}

// ---------------------------------------------------------------------------
// 1. Single-object fetch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_object_returns_definition_and_own_grants() {
    let catalog = seeded();
    let fetched = fetch_object(&catalog, ObjectType::Procedure, "usp_GetUser", Duration::from_secs(5))
        .await
        .expect("fetch");
    assert_eq!(fetched.object.name, "usp_GetUser");
    assert_eq!(fetched.permissions, vec![grant("dbo", "usp_GetUser", "app_role")]);
    assert_eq!(catalog.sessions_opened(), 1);
    assert_eq!(catalog.sessions_open(), 0, "session must be closed");
}

#[rstest]
#[case(ObjectType::Procedure, "usp_Missing")]
#[case(ObjectType::View, "usp_GetUser")]
#[tokio::test]
async fn no_rows_is_not_found_and_session_closed(#[case] ty: ObjectType, #[case] name: &str) {
    let catalog = seeded();
    let err = fetch_object(&catalog, ty, name, Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, CatalogError::ObjectNotFound { .. }), "got: {err}");
    assert_eq!(catalog.sessions_open(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_catalog_times_out_and_session_closed() {
    let catalog = seeded();
    catalog.set_delay(Some(Duration::from_secs(10)));
    let err = fetch_object(&catalog, ObjectType::Procedure, "usp_GetUser", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Timeout(_)), "got: {err}");
    assert_eq!(catalog.sessions_open(), 0);
}

#[tokio::test]
async fn upsert_replaces_definition() {
    let catalog = seeded();
    catalog.upsert(object("dbo", "usp_GetUser", "P ", "CREATE PROCEDURE dbo.usp_GetUser AS SELECT 2"));
    let fetched = fetch_object(&catalog, ObjectType::Procedure, "usp_GetUser", Duration::from_secs(5))
        .await
        .expect("fetch");
    assert!(fetched.object.text.ends_with("SELECT 2"));
    let snapshot = fetch_snapshot(&catalog, &SnapshotScope::default(), Duration::from_secs(5))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.objects.len(), 2);
}

#[tokio::test]
async fn failed_close_fails_the_fetch_after_closing() {
    let catalog = seeded();
    catalog.set_fail_close(true);

    let err = fetch_object(&catalog, ObjectType::Procedure, "usp_GetUser", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable(_)), "got: {err}");

    let err = fetch_snapshot(&catalog, &SnapshotScope::default(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Unavailable(_)), "got: {err}");
    assert_eq!(catalog.sessions_opened(), 2);
    assert_eq!(catalog.sessions_open(), 0);
}

#[tokio::test]
async fn query_errors_win_over_close_errors() {
    let catalog = seeded();
    catalog.set_fail_close(true);
    let err = fetch_object(&catalog, ObjectType::Procedure, "usp_Missing", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::ObjectNotFound { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Snapshot scope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_scope_skips_jobs_and_data() {
    let catalog = seeded();
    let snapshot = fetch_snapshot(&catalog, &SnapshotScope::default(), Duration::from_secs(5))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.tables.len(), 2);
    assert!(snapshot.jobs.is_empty());
    assert!(snapshot.data.is_empty());
    assert_eq!(catalog.queries_issued(), 8);
}

#[tokio::test]
async fn scope_selects_jobs_and_listed_tables() {
    let catalog = seeded();
    let scope = SnapshotScope { jobs: true, data: vec![" DBO.users ".into(), "dbo.Missing".into()] };
    let snapshot = fetch_snapshot(&catalog, &scope, Duration::from_secs(5))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.jobs.len(), 1);
    assert_eq!(snapshot.data, vec![rows("dbo", "Users")]);
    assert_eq!(catalog.sessions_open(), 0);
}

// ---------------------------------------------------------------------------
// 3. Export directory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_catalog_reads_json_files() {
    let dir = TempDir::new().expect("tempdir");
    let objects = serde_json::to_string(&seeded_objects()).expect("json");
    std::fs::write(dir.path().join("objects.json"), objects).expect("write");

    let catalog = ExportCatalog::new(dir.path());
    let fetched = fetch_object(&catalog, ObjectType::View, "VW_USERS", Duration::from_secs(5))
        .await
        .expect("fetch");
    assert_eq!(fetched.object.name, "vw_Users");
    assert!(fetched.permissions.is_empty(), "permissions.json is optional");
}

#[tokio::test]
async fn export_catalog_without_objects_file_is_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let catalog = ExportCatalog::new(dir.path());
    let err = fetch_snapshot(&catalog, &SnapshotScope::default(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("objects.json"));
}

#[tokio::test]
async fn export_catalog_reports_malformed_json() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("objects.json"), "[ { \"schema\": ").expect("write");
    let catalog = ExportCatalog::new(dir.path());
    let err = fetch_snapshot(&catalog, &SnapshotScope::default(), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Parse { .. }), "got: {err}");
}

#[tokio::test]
async fn export_catalog_reads_tables_and_data() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("objects.json"), "[]").expect("write");
    std::fs::write(
        dir.path().join("tables.json"),
        r#"[{"object_id":5,"schema":"dbo","name":"Users"}]"#,
    )
    .expect("write");
    std::fs::write(
        dir.path().join("columns.json"),
        r#"[{"object_id":5,"name":"Id","datatype":"int","is_identity":true,"seed_value":1,"increment_value":1}]"#,
    )
    .expect("write");
    std::fs::write(
        dir.path().join("data.json"),
        r#"[{"schema":"dbo","name":"Users","columns":["Id","Name"],"rows":[[1,"Ann"],[2,null]],"has_identity":true}]"#,
    )
    .expect("write");

    let catalog = ExportCatalog::new(dir.path());
    let scope = SnapshotScope { jobs: false, data: vec!["dbo.Users".into()] };
    let snapshot = fetch_snapshot(&catalog, &scope, Duration::from_secs(5))
        .await
        .expect("snapshot");
    assert_eq!(snapshot.tables, vec![table(5, "dbo", "Users")]);
    assert!(snapshot.columns[0].is_identity);
    assert_eq!(snapshot.data.len(), 1);
    assert_eq!(snapshot.data[0].rows[1], vec![SqlValue::Int(2), SqlValue::Null]);
    assert!(snapshot.jobs.is_empty(), "jobs.json is optional");
}

fn seeded_objects() -> Vec<SqlObject> {
    vec![
        object("dbo", "usp_GetUser", "P ", "CREATE PROCEDURE dbo.usp_GetUser AS SELECT 1"),
        object("dbo", "vw_Users", "V ", "CREATE VIEW dbo.vw_Users AS SELECT 1 AS x"),
    ]
}
