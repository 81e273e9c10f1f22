//! Catalog access for ssc.
//!
//! A [`Catalog`] opens short-lived [`CatalogSession`]s against the remote store.
//! Every fetch is bounded by the setting's request timeout. A session is always
//! closed before the fetch helpers return; a failed close fails the fetch.

mod export;
mod memory;
mod mssql;
mod queries;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use ssc_core::{
    CatalogSnapshot, CatalogSource, ObjectType, Setting, SqlColumn, SqlDataResult, SqlForeignKey,
    SqlIndex, SqlJob, SqlJobSchedule, SqlJobStep, SqlObject, SqlPermission, SqlPrimaryKey,
    SqlTable, SqlType,
};
use thiserror::Error;

pub use export::ExportCatalog;
pub use memory::MemoryCatalog;
pub use mssql::MssqlCatalog;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors from catalog access.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog request timed out after {0:?}")]
    Timeout(Duration),

    #[error("object '{name}' of type {object_type} not found")]
    ObjectNotFound { object_type: ObjectType, name: String },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("SQL Server error: {0}")]
    Driver(#[from] tiberius::error::Error),
}

/// The rows fetched for one object: its definition plus every grant on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedObject {
    pub object: SqlObject,
    pub permissions: Vec<SqlPermission>,
}

/// Which optional row sets a snapshot includes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotScope {
    /// Read agent jobs, steps and schedules.
    pub jobs: bool,
    /// Tables (`schema.name`) whose rows are read.
    pub data: Vec<String>,
}

impl SnapshotScope {
    /// Jobs when the jobs folder is enabled; data for the listed tables when
    /// the data folder is enabled.
    pub fn for_setting(setting: &Setting) -> Self {
        Self {
            jobs: setting.output.jobs.is_enabled(),
            data: if setting.output.data.is_enabled() {
                setting.data.clone()
            } else {
                Vec::new()
            },
        }
    }

    fn wants_data(&self, table: &SqlTable) -> bool {
        let qualified = format!("{}.{}", table.schema, table.name);
        self.data.iter().any(|t| t.trim().eq_ignore_ascii_case(&qualified))
    }
}

/// A source of catalog sessions.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn CatalogSession>, CatalogError>;
}

/// One open session. Queries may be issued concurrently on the same session.
#[async_trait]
pub trait CatalogSession: Send + Sync {
    /// Rows for a single object, matched by type and exact name.
    async fn object(&self, object_type: ObjectType, name: &str)
        -> Result<Vec<SqlObject>, CatalogError>;

    /// Every programmable object in the database.
    async fn objects(&self) -> Result<Vec<SqlObject>, CatalogError>;

    /// Every permission grant in the database.
    async fn permissions(&self) -> Result<Vec<SqlPermission>, CatalogError>;

    async fn tables(&self) -> Result<Vec<SqlTable>, CatalogError>;

    /// Columns of every table and table type.
    async fn columns(&self) -> Result<Vec<SqlColumn>, CatalogError>;

    async fn primary_keys(&self) -> Result<Vec<SqlPrimaryKey>, CatalogError>;

    async fn foreign_keys(&self) -> Result<Vec<SqlForeignKey>, CatalogError>;

    async fn indexes(&self) -> Result<Vec<SqlIndex>, CatalogError>;

    /// User-defined alias types and table types.
    async fn types(&self) -> Result<Vec<SqlType>, CatalogError>;

    async fn jobs(&self) -> Result<Vec<SqlJob>, CatalogError>;

    async fn job_steps(&self) -> Result<Vec<SqlJobStep>, CatalogError>;

    async fn job_schedules(&self) -> Result<Vec<SqlJobSchedule>, CatalogError>;

    /// Every row of one table, `None` when the source has no data for it.
    async fn data(&self, table: &SqlTable) -> Result<Option<SqlDataResult>, CatalogError>;

    async fn close(self: Box<Self>) -> Result<(), CatalogError>;
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the catalog configured for `setting`.
///
/// Settings without a `catalog` key read the live server.
pub fn open(setting: &Setting) -> Result<Box<dyn Catalog>, CatalogError> {
    match &setting.catalog {
        Some(CatalogSource::Export { path }) => Ok(Box::new(ExportCatalog::new(path.clone()))),
        Some(CatalogSource::Mssql) | None => {
            if setting.connection.server.trim().is_empty() {
                return Err(CatalogError::Unavailable(format!(
                    "setting '{}' has no server configured",
                    setting.name
                )));
            }
            Ok(Box::new(MssqlCatalog::new(setting.connection.clone())))
        }
    }
}

/// Fetch one object and the permissions granted on it in a single session.
///
/// Both queries run concurrently. The session is closed before returning.
/// Returns `CatalogError::ObjectNotFound` when the object query yields no rows.
pub async fn fetch_object(
    catalog: &dyn Catalog,
    object_type: ObjectType,
    name: &str,
    timeout: Duration,
) -> Result<FetchedObject, CatalogError> {
    let session = bounded(timeout, catalog.connect()).await?;
    let (objects, permissions) = tokio::join!(
        bounded(timeout, session.object(object_type, name)),
        bounded(timeout, session.permissions()),
    );
    let closed = bounded(timeout, session.close()).await;

    let object = objects?
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::ObjectNotFound { object_type, name: name.to_string() })?;
    let permissions = permissions?
        .into_iter()
        .filter(|p| p.name == object.name && p.schema == object.schema)
        .collect();
    closed?;
    Ok(FetchedObject { object, permissions })
}

/// Fetch every row set `scope` asks for in a single session.
///
/// Independent queries run concurrently; table data is read once the table
/// list is known.
pub async fn fetch_snapshot(
    catalog: &dyn Catalog,
    scope: &SnapshotScope,
    timeout: Duration,
) -> Result<CatalogSnapshot, CatalogError> {
    let session = bounded(timeout, catalog.connect()).await?;
    let snapshot = read_snapshot(session.as_ref(), scope, timeout).await;
    let closed = bounded(timeout, session.close()).await;
    let snapshot = snapshot?;
    closed?;
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

async fn read_snapshot(
    session: &dyn CatalogSession,
    scope: &SnapshotScope,
    timeout: Duration,
) -> Result<CatalogSnapshot, CatalogError> {
    let (objects, permissions, tables, columns, primary_keys, foreign_keys, indexes, types) =
        tokio::try_join!(
            bounded(timeout, session.objects()),
            bounded(timeout, session.permissions()),
            bounded(timeout, session.tables()),
            bounded(timeout, session.columns()),
            bounded(timeout, session.primary_keys()),
            bounded(timeout, session.foreign_keys()),
            bounded(timeout, session.indexes()),
            bounded(timeout, session.types()),
        )?;

    let (jobs, job_steps, job_schedules) = if scope.jobs {
        tokio::try_join!(
            bounded(timeout, session.jobs()),
            bounded(timeout, session.job_steps()),
            bounded(timeout, session.job_schedules()),
        )?
    } else {
        Default::default()
    };

    let mut data = Vec::new();
    for table in tables.iter().filter(|t| scope.wants_data(t)) {
        match bounded(timeout, session.data(table)).await? {
            Some(rows) => data.push(rows),
            None => tracing::debug!(schema = %table.schema, table = %table.name, "no data rows available"),
        }
    }

    Ok(CatalogSnapshot {
        objects,
        permissions,
        tables,
        columns,
        primary_keys,
        foreign_keys,
        indexes,
        types,
        data,
        jobs,
        job_steps,
        job_schedules,
    })
}

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, CatalogError>
where
    F: Future<Output = Result<T, CatalogError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CatalogError::Timeout(timeout)),
    }
}
