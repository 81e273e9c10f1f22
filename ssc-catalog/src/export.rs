//! Catalog backed by a directory of JSON exports.
//!
//! ```text
//! <dir>/objects.json         [ { "schema", "name", "type", "text" }, ... ]
//! <dir>/permissions.json     [ { "schema", "name", "state", "permission", "grantee" }, ... ]
//! <dir>/tables.json          [ { "object_id", "schema", "name" }, ... ]
//! <dir>/columns.json         [ { "object_id", "name", "datatype", "max_length", ... }, ... ]
//! <dir>/primary_keys.json    foreign_keys.json  indexes.json  types.json
//! <dir>/jobs.json            job_steps.json     job_schedules.json
//! <dir>/data.json            [ { "schema", "name", "columns", "rows", "has_identity" }, ... ]
//! ```
//!
//! Only `objects.json` is required. Files are re-read on every query so edits
//! show up without restarting a watch session.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use ssc_core::{
    ObjectType, SqlColumn, SqlDataResult, SqlForeignKey, SqlIndex, SqlJob, SqlJobSchedule,
    SqlJobStep, SqlObject, SqlPermission, SqlPrimaryKey, SqlTable, SqlType,
};

use crate::{Catalog, CatalogError, CatalogSession};

const OBJECTS_FILE: &str = "objects.json";
const PERMISSIONS_FILE: &str = "permissions.json";
const TABLES_FILE: &str = "tables.json";
const COLUMNS_FILE: &str = "columns.json";
const PRIMARY_KEYS_FILE: &str = "primary_keys.json";
const FOREIGN_KEYS_FILE: &str = "foreign_keys.json";
const INDEXES_FILE: &str = "indexes.json";
const TYPES_FILE: &str = "types.json";
const JOBS_FILE: &str = "jobs.json";
const JOB_STEPS_FILE: &str = "job_steps.json";
const JOB_SCHEDULES_FILE: &str = "job_schedules.json";
const DATA_FILE: &str = "data.json";

#[derive(Debug, Clone)]
pub struct ExportCatalog {
    dir: PathBuf,
}

impl ExportCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Catalog for ExportCatalog {
    async fn connect(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        let objects = self.dir.join(OBJECTS_FILE);
        match tokio::fs::metadata(&objects).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(CatalogError::Unavailable(format!(
                    "{} is not a file",
                    objects.display()
                )))
            }
            Err(e) => return Err(CatalogError::Io { path: objects, source: e }),
        }
        tracing::debug!(dir = %self.dir.display(), "opened export catalog session");
        Ok(Box::new(ExportSession { dir: self.dir.clone() }))
    }
}

struct ExportSession {
    dir: PathBuf,
}

#[async_trait]
impl CatalogSession for ExportSession {
    async fn object(
        &self,
        object_type: ObjectType,
        name: &str,
    ) -> Result<Vec<SqlObject>, CatalogError> {
        let rows = self.objects().await?;
        Ok(rows
            .into_iter()
            .filter(|o| o.object_type() == Some(object_type) && o.name.eq_ignore_ascii_case(name))
            .collect())
    }

    async fn objects(&self) -> Result<Vec<SqlObject>, CatalogError> {
        read_rows(&self.dir.join(OBJECTS_FILE), false).await
    }

    async fn permissions(&self) -> Result<Vec<SqlPermission>, CatalogError> {
        self.optional(PERMISSIONS_FILE).await
    }

    async fn tables(&self) -> Result<Vec<SqlTable>, CatalogError> {
        self.optional(TABLES_FILE).await
    }

    async fn columns(&self) -> Result<Vec<SqlColumn>, CatalogError> {
        self.optional(COLUMNS_FILE).await
    }

    async fn primary_keys(&self) -> Result<Vec<SqlPrimaryKey>, CatalogError> {
        self.optional(PRIMARY_KEYS_FILE).await
    }

    async fn foreign_keys(&self) -> Result<Vec<SqlForeignKey>, CatalogError> {
        self.optional(FOREIGN_KEYS_FILE).await
    }

    async fn indexes(&self) -> Result<Vec<SqlIndex>, CatalogError> {
        self.optional(INDEXES_FILE).await
    }

    async fn types(&self) -> Result<Vec<SqlType>, CatalogError> {
        self.optional(TYPES_FILE).await
    }

    async fn jobs(&self) -> Result<Vec<SqlJob>, CatalogError> {
        self.optional(JOBS_FILE).await
    }

    async fn job_steps(&self) -> Result<Vec<SqlJobStep>, CatalogError> {
        self.optional(JOB_STEPS_FILE).await
    }

    async fn job_schedules(&self) -> Result<Vec<SqlJobSchedule>, CatalogError> {
        self.optional(JOB_SCHEDULES_FILE).await
    }

    async fn data(&self, table: &SqlTable) -> Result<Option<SqlDataResult>, CatalogError> {
        let data: Vec<SqlDataResult> = self.optional(DATA_FILE).await?;
        Ok(data
            .into_iter()
            .find(|d| d.schema == table.schema && d.name == table.name))
    }

    async fn close(self: Box<Self>) -> Result<(), CatalogError> {
        Ok(())
    }
}

impl ExportSession {
    async fn optional<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, CatalogError> {
        read_rows(&self.dir.join(file), true).await
    }
}

async fn read_rows<T: DeserializeOwned>(
    path: &Path,
    optional: bool,
) -> Result<Vec<T>, CatalogError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if optional && e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(CatalogError::Io { path: path.to_path_buf(), source: e }),
    };
    serde_json::from_str(&raw)
        .map_err(|source| CatalogError::Parse { path: path.to_path_buf(), source })
}
