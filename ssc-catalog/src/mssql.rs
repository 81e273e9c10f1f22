//! Live SQL Server catalog over TDS.
//!
//! One [`MssqlCatalog::connect`] opens one TCP connection. The TDS protocol
//! runs one request at a time, so concurrent queries on a session queue on
//! the client lock.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use ssc_core::{
    Connection, ObjectType, SqlColumn, SqlDataResult, SqlForeignKey, SqlIndex, SqlJob,
    SqlJobSchedule, SqlJobStep, SqlObject, SqlPermission, SqlPrimaryKey, SqlTable, SqlType,
    SqlValue,
};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::queries;
use crate::{Catalog, CatalogError, CatalogSession};

/// Catalog reading `sys.*` views (and `msdb` for jobs) of a live server.
#[derive(Debug, Clone)]
pub struct MssqlCatalog {
    connection: Connection,
}

impl MssqlCatalog {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    fn config(&self) -> Config {
        let conn = &self.connection;
        let mut config = Config::new();
        config.host(&conn.server);
        config.port(conn.port());
        config.database(&conn.database);
        config.authentication(AuthMethod::sql_server(&conn.user, &conn.password));
        config.encryption(if conn.encrypt() {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });
        if conn.trust_server_certificate() {
            config.trust_cert();
        }
        config
    }
}

#[async_trait]
impl Catalog for MssqlCatalog {
    async fn connect(&self) -> Result<Box<dyn CatalogSession>, CatalogError> {
        let config = self.config();
        let addr = config.get_addr();
        let tcp = TcpStream::connect(&addr).await.map_err(|e| {
            CatalogError::Unavailable(format!("cannot reach {addr}: {e}"))
        })?;
        tcp.set_nodelay(true)
            .map_err(|e| CatalogError::Unavailable(format!("cannot configure socket to {addr}: {e}")))?;
        let client = Client::connect(config, tcp.compat_write()).await?;
        tracing::debug!(
            server = %self.connection.server,
            database = %self.connection.database,
            "opened SQL Server session"
        );
        Ok(Box::new(MssqlSession { client: Mutex::new(client) }))
    }
}

struct MssqlSession {
    client: Mutex<Client<Compat<TcpStream>>>,
}

impl MssqlSession {
    async fn rows(&self, query: Query<'_>) -> Result<Vec<Row>, CatalogError> {
        let mut client = self.client.lock().await;
        let stream = query.query(&mut *client).await?;
        Ok(stream.into_first_result().await?)
    }

    async fn decode<T>(
        &self,
        sql: &'static str,
        convert: fn(&Row) -> Result<T, CatalogError>,
    ) -> Result<Vec<T>, CatalogError> {
        self.rows(Query::new(sql)).await?.iter().map(convert).collect()
    }
}

#[async_trait]
impl CatalogSession for MssqlSession {
    async fn object(
        &self,
        object_type: ObjectType,
        name: &str,
    ) -> Result<Vec<SqlObject>, CatalogError> {
        let mut query = Query::new(queries::OBJECT);
        query.bind(object_type.code());
        query.bind(name.to_string());
        self.rows(query).await?.iter().map(object_row).collect()
    }

    async fn objects(&self) -> Result<Vec<SqlObject>, CatalogError> {
        self.decode(queries::OBJECTS, object_row).await
    }

    async fn permissions(&self) -> Result<Vec<SqlPermission>, CatalogError> {
        self.decode(queries::PERMISSIONS, |row| {
            Ok(SqlPermission {
                schema: text(row, "schema")?,
                name: text(row, "name")?,
                state: text(row, "state")?,
                permission: text(row, "permission")?,
                grantee: text(row, "grantee")?,
            })
        })
        .await
    }

    async fn tables(&self) -> Result<Vec<SqlTable>, CatalogError> {
        self.decode(queries::TABLES, |row| {
            Ok(SqlTable {
                object_id: int(row, "object_id")?,
                schema: text(row, "schema")?,
                name: text(row, "name")?,
            })
        })
        .await
    }

    async fn columns(&self) -> Result<Vec<SqlColumn>, CatalogError> {
        self.decode(queries::COLUMNS, |row| {
            Ok(SqlColumn {
                object_id: int(row, "object_id")?,
                name: text(row, "name")?,
                datatype: text(row, "datatype")?,
                max_length: int(row, "max_length")?,
                precision: int(row, "precision")?,
                scale: int(row, "scale")?,
                is_nullable: flag(row, "is_nullable")?,
                is_identity: flag(row, "is_identity")?,
                is_computed: flag(row, "is_computed")?,
                seed_value: row.try_get::<i64, _>("seed_value")?,
                increment_value: row.try_get::<i64, _>("increment_value")?,
                formula: opt_text(row, "formula")?,
                collation_name: opt_text(row, "collation_name")?,
                default_name: opt_text(row, "default_name")?,
                default_definition: opt_text(row, "default_definition")?,
            })
        })
        .await
    }

    async fn primary_keys(&self) -> Result<Vec<SqlPrimaryKey>, CatalogError> {
        self.decode(queries::PRIMARY_KEYS, |row| {
            Ok(SqlPrimaryKey {
                object_id: int(row, "object_id")?,
                name: text(row, "name")?,
                column: text(row, "column")?,
                is_descending_key: flag(row, "is_descending_key")?,
                type_desc: text(row, "type")?,
            })
        })
        .await
    }

    async fn foreign_keys(&self) -> Result<Vec<SqlForeignKey>, CatalogError> {
        self.decode(queries::FOREIGN_KEYS, |row| {
            Ok(SqlForeignKey {
                object_id: int(row, "object_id")?,
                name: text(row, "name")?,
                schema: text(row, "schema")?,
                table: text(row, "table")?,
                column: text(row, "column")?,
                reference_schema: text(row, "reference_schema")?,
                reference_table: text(row, "reference_table")?,
                reference_column: text(row, "reference_column")?,
                delete_action: text(row, "delete_action")?,
                update_action: text(row, "update_action")?,
            })
        })
        .await
    }

    async fn indexes(&self) -> Result<Vec<SqlIndex>, CatalogError> {
        self.decode(queries::INDEXES, |row| {
            Ok(SqlIndex {
                object_id: int(row, "object_id")?,
                index_id: int(row, "index_id")?,
                name: text(row, "name")?,
                column: text(row, "column")?,
                is_descending_key: flag(row, "is_descending_key")?,
                is_included_column: flag(row, "is_included_column")?,
                is_unique: flag(row, "is_unique")?,
                type_desc: text(row, "type")?,
            })
        })
        .await
    }

    async fn types(&self) -> Result<Vec<SqlType>, CatalogError> {
        self.decode(queries::TYPES, |row| {
            Ok(SqlType {
                schema: text(row, "schema")?,
                name: text(row, "name")?,
                system_type: text(row, "system_type")?,
                max_length: int(row, "max_length")?,
                precision: int(row, "precision")?,
                scale: int(row, "scale")?,
                is_nullable: flag(row, "is_nullable")?,
                type_code: opt_text(row, "type")?,
                object_id: row.try_get::<i32, _>("object_id")?,
            })
        })
        .await
    }

    async fn jobs(&self) -> Result<Vec<SqlJob>, CatalogError> {
        self.decode(queries::JOBS, |row| {
            Ok(SqlJob {
                job_id: text(row, "job_id")?,
                name: text(row, "name")?,
                enabled: flag(row, "enabled")?,
                description: opt_text(row, "description")?,
            })
        })
        .await
    }

    async fn job_steps(&self) -> Result<Vec<SqlJobStep>, CatalogError> {
        self.decode(queries::JOB_STEPS, |row| {
            Ok(SqlJobStep {
                job_id: text(row, "job_id")?,
                step_id: int(row, "step_id")?,
                step_name: text(row, "step_name")?,
                subsystem: text(row, "subsystem")?,
                command: text(row, "command")?,
                database_name: opt_text(row, "database_name")?,
                on_success_action: int(row, "on_success_action")?,
                on_success_step_id: int(row, "on_success_step_id")?,
                on_fail_action: int(row, "on_fail_action")?,
                on_fail_step_id: int(row, "on_fail_step_id")?,
                retry_attempts: int(row, "retry_attempts")?,
                retry_interval: int(row, "retry_interval")?,
            })
        })
        .await
    }

    async fn job_schedules(&self) -> Result<Vec<SqlJobSchedule>, CatalogError> {
        self.decode(queries::JOB_SCHEDULES, |row| {
            Ok(SqlJobSchedule {
                job_id: text(row, "job_id")?,
                name: text(row, "name")?,
                enabled: flag(row, "enabled")?,
                freq_type: int(row, "freq_type")?,
                freq_interval: int(row, "freq_interval")?,
                freq_subday_type: int(row, "freq_subday_type")?,
                freq_subday_interval: int(row, "freq_subday_interval")?,
                freq_relative_interval: int(row, "freq_relative_interval")?,
                freq_recurrence_factor: int(row, "freq_recurrence_factor")?,
                active_start_date: int(row, "active_start_date")?,
                active_end_date: int(row, "active_end_date")?,
                active_start_time: int(row, "active_start_time")?,
                active_end_time: int(row, "active_end_time")?,
            })
        })
        .await
    }

    async fn data(&self, table: &SqlTable) -> Result<Option<SqlDataResult>, CatalogError> {
        let mut identity = Query::new(queries::HAS_IDENTITY);
        identity.bind(queries::quoted_table(&table.schema, &table.name));
        let has_identity = match self.rows(identity).await?.first() {
            Some(row) => flag(row, "has_identity")?,
            None => false,
        };

        let rows = self
            .rows(Query::new(queries::select_all(&table.schema, &table.name)))
            .await?;
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| row.cells().map(|(_, data)| value(data)).collect())
            .collect::<Result<Vec<Vec<SqlValue>>, CatalogError>>()?;

        Ok(Some(SqlDataResult {
            schema: table.schema.clone(),
            name: table.name.clone(),
            columns,
            rows,
            has_identity,
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), CatalogError> {
        let client = self.client.into_inner();
        client.close().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn object_row(row: &Row) -> Result<SqlObject, CatalogError> {
    Ok(SqlObject {
        schema: text(row, "schema")?,
        name: text(row, "name")?,
        type_code: text(row, "type")?,
        text: text(row, "text")?,
    })
}

fn text(row: &Row, col: &str) -> Result<String, CatalogError> {
    Ok(opt_text(row, col)?.unwrap_or_default())
}

fn opt_text(row: &Row, col: &str) -> Result<Option<String>, CatalogError> {
    Ok(row.try_get::<&str, _>(col)?.map(str::to_string))
}

fn int(row: &Row, col: &str) -> Result<i32, CatalogError> {
    Ok(row.try_get::<i32, _>(col)?.unwrap_or_default())
}

fn flag(row: &Row, col: &str) -> Result<bool, CatalogError> {
    Ok(row.try_get::<bool, _>(col)?.unwrap_or_default())
}

/// Convert one cell of exported table data.
fn value(data: &ColumnData<'static>) -> Result<SqlValue, CatalogError> {
    let value = match data {
        ColumnData::U8(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(v.into())),
        ColumnData::I16(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(v.into())),
        ColumnData::I32(v) => v.map_or(SqlValue::Null, |v| SqlValue::Int(v.into())),
        ColumnData::I64(v) => v.map_or(SqlValue::Null, SqlValue::Int),
        ColumnData::F32(v) => v.map_or(SqlValue::Null, |v| SqlValue::Float(v.into())),
        ColumnData::F64(v) => v.map_or(SqlValue::Null, SqlValue::Float),
        ColumnData::Bit(v) => v.map_or(SqlValue::Null, SqlValue::Bool),
        ColumnData::String(v) => {
            v.as_ref().map_or(SqlValue::Null, |s| SqlValue::Text(s.to_string()))
        }
        ColumnData::Guid(v) => v.as_ref().map_or(SqlValue::Null, |g| SqlValue::Text(g.to_string())),
        ColumnData::Binary(v) => v
            .as_ref()
            .map_or(SqlValue::Null, |b| SqlValue::Binary { binary: hex::encode(b) }),
        ColumnData::Numeric(v) => {
            v.as_ref().map_or(SqlValue::Null, |n| SqlValue::Text(n.to_string()))
        }
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?
                .map_or(SqlValue::Null, |v| text_value(v.format("%Y-%m-%dT%H:%M:%S%.f")))
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?
            .map_or(SqlValue::Null, |v| text_value(v.format("%Y-%m-%d"))),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?
            .map_or(SqlValue::Null, |v| text_value(v.format("%H:%M:%S%.f"))),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)?
            .map_or(SqlValue::Null, |v| text_value(v.format("%Y-%m-%dT%H:%M:%S%.f%:z"))),
        other => {
            tracing::debug!(?other, "unsupported data cell exported as NULL");
            SqlValue::Null
        }
    };
    Ok(value)
}

fn text_value(formatted: impl std::fmt::Display) -> SqlValue {
    SqlValue::Text(formatted.to_string())
}
