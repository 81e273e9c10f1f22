//! T-SQL text for the live catalog.
//!
//! Column aliases match the row struct field names. Narrow integer columns are
//! cast to `int` and flags to `bit` so every row decodes with the same types.

pub(crate) const OBJECTS: &str = "
SELECT s.name AS [schema], o.name AS [name], CAST(o.type AS nvarchar(2)) AS [type], m.definition AS [text]
FROM sys.objects o
JOIN sys.schemas s ON o.schema_id = s.schema_id
JOIN sys.sql_modules m ON o.object_id = m.object_id
WHERE o.type IN ('P', 'V', 'TF', 'IF', 'FN', 'TR') AND o.is_ms_shipped = 0
ORDER BY s.name, o.name";

/// `@P1` type code, `@P2` object name.
pub(crate) const OBJECT: &str = "
SELECT s.name AS [schema], o.name AS [name], CAST(o.type AS nvarchar(2)) AS [type], m.definition AS [text]
FROM sys.objects o
JOIN sys.schemas s ON o.schema_id = s.schema_id
JOIN sys.sql_modules m ON o.object_id = m.object_id
WHERE o.type = @P1 AND o.name = @P2";

pub(crate) const PERMISSIONS: &str = "
SELECT s.name AS [schema], o.name AS [name], p.state_desc AS [state],
       p.permission_name AS [permission], pr.name AS [grantee]
FROM sys.database_permissions p
JOIN sys.objects o ON p.major_id = o.object_id
JOIN sys.schemas s ON o.schema_id = s.schema_id
JOIN sys.database_principals pr ON p.grantee_principal_id = pr.principal_id
WHERE p.class = 1
ORDER BY s.name, o.name, pr.name";

pub(crate) const TABLES: &str = "
SELECT t.object_id, s.name AS [schema], t.name AS [name]
FROM sys.tables t
JOIN sys.schemas s ON t.schema_id = s.schema_id
WHERE t.is_ms_shipped = 0
ORDER BY s.name, t.name";

pub(crate) const COLUMNS: &str = "
SELECT c.object_id, c.name, tp.name AS datatype,
       CAST(c.max_length AS int) AS max_length,
       CAST(c.precision AS int) AS [precision],
       CAST(c.scale AS int) AS [scale],
       c.is_nullable, c.is_identity, c.is_computed,
       CAST(ic.seed_value AS bigint) AS seed_value,
       CAST(ic.increment_value AS bigint) AS increment_value,
       cc.definition AS formula, c.collation_name,
       dc.name AS default_name, dc.definition AS default_definition
FROM sys.columns c
JOIN sys.types tp ON c.user_type_id = tp.user_type_id
LEFT JOIN sys.identity_columns ic ON ic.object_id = c.object_id AND ic.column_id = c.column_id
LEFT JOIN sys.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id
LEFT JOIN sys.default_constraints dc
       ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id
WHERE c.object_id IN (
    SELECT object_id FROM sys.tables WHERE is_ms_shipped = 0
    UNION ALL
    SELECT type_table_object_id FROM sys.table_types
)
ORDER BY c.object_id, c.column_id";

pub(crate) const PRIMARY_KEYS: &str = "
SELECT i.object_id, i.name, c.name AS [column], ic.is_descending_key, i.type_desc AS [type]
FROM sys.indexes i
JOIN sys.index_columns ic ON i.object_id = ic.object_id AND i.index_id = ic.index_id
JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id
JOIN sys.tables t ON i.object_id = t.object_id
WHERE i.is_primary_key = 1 AND t.is_ms_shipped = 0
ORDER BY i.object_id, ic.key_ordinal";

pub(crate) const FOREIGN_KEYS: &str = "
SELECT fk.parent_object_id AS object_id, fk.name,
       s.name AS [schema], t.name AS [table], c.name AS [column],
       rs.name AS reference_schema, rt.name AS reference_table, rc.name AS reference_column,
       fk.delete_referential_action_desc AS delete_action,
       fk.update_referential_action_desc AS update_action
FROM sys.foreign_keys fk
JOIN sys.foreign_key_columns fkc ON fk.object_id = fkc.constraint_object_id
JOIN sys.tables t ON fkc.parent_object_id = t.object_id
JOIN sys.schemas s ON t.schema_id = s.schema_id
JOIN sys.columns c ON fkc.parent_object_id = c.object_id AND fkc.parent_column_id = c.column_id
JOIN sys.tables rt ON fkc.referenced_object_id = rt.object_id
JOIN sys.schemas rs ON rt.schema_id = rs.schema_id
JOIN sys.columns rc
       ON fkc.referenced_object_id = rc.object_id AND fkc.referenced_column_id = rc.column_id
WHERE t.is_ms_shipped = 0
ORDER BY fk.parent_object_id, fk.name, fkc.constraint_column_id";

pub(crate) const INDEXES: &str = "
SELECT i.object_id, i.index_id, i.name, c.name AS [column],
       ic.is_descending_key, ic.is_included_column, i.is_unique, i.type_desc AS [type]
FROM sys.indexes i
JOIN sys.index_columns ic ON i.object_id = ic.object_id AND i.index_id = ic.index_id
JOIN sys.columns c ON ic.object_id = c.object_id AND ic.column_id = c.column_id
JOIN sys.tables t ON i.object_id = t.object_id
WHERE i.is_primary_key = 0 AND i.is_unique_constraint = 0 AND i.type > 0
  AND t.is_ms_shipped = 0
ORDER BY i.object_id, i.name, ic.key_ordinal";

pub(crate) const TYPES: &str = "
SELECT s.name AS [schema], t.name, ISNULL(st.name, N'') AS system_type,
       CAST(t.max_length AS int) AS max_length,
       CAST(t.precision AS int) AS [precision],
       CAST(t.scale AS int) AS [scale],
       t.is_nullable,
       CASE WHEN t.is_table_type = 1 THEN N'TT' END AS [type],
       tt.type_table_object_id AS object_id
FROM sys.types t
JOIN sys.schemas s ON t.schema_id = s.schema_id
LEFT JOIN sys.types st ON st.user_type_id = t.system_type_id
LEFT JOIN sys.table_types tt ON tt.user_type_id = t.user_type_id
WHERE t.is_user_defined = 1
ORDER BY s.name, t.name";

/// Jobs with at least one step running against the connected database.
pub(crate) const JOBS: &str = "
SELECT CAST(j.job_id AS nvarchar(36)) AS job_id, j.name,
       CAST(j.enabled AS bit) AS enabled, j.description
FROM msdb.dbo.sysjobs j
WHERE j.job_id IN (SELECT job_id FROM msdb.dbo.sysjobsteps WHERE database_name = DB_NAME())
ORDER BY j.name";

pub(crate) const JOB_STEPS: &str = "
SELECT CAST(st.job_id AS nvarchar(36)) AS job_id, st.step_id, st.step_name, st.subsystem,
       st.command, st.database_name,
       CAST(st.on_success_action AS int) AS on_success_action, st.on_success_step_id,
       CAST(st.on_fail_action AS int) AS on_fail_action, st.on_fail_step_id,
       st.retry_attempts, st.retry_interval
FROM msdb.dbo.sysjobsteps st
WHERE st.job_id IN (SELECT job_id FROM msdb.dbo.sysjobsteps WHERE database_name = DB_NAME())
ORDER BY st.job_id, st.step_id";

pub(crate) const JOB_SCHEDULES: &str = "
SELECT CAST(js.job_id AS nvarchar(36)) AS job_id, s.name, CAST(s.enabled AS bit) AS enabled,
       s.freq_type, s.freq_interval, s.freq_subday_type, s.freq_subday_interval,
       s.freq_relative_interval, s.freq_recurrence_factor,
       s.active_start_date, s.active_end_date, s.active_start_time, s.active_end_time
FROM msdb.dbo.sysjobschedules js
JOIN msdb.dbo.sysschedules s ON js.schedule_id = s.schedule_id
ORDER BY js.job_id, s.name";

/// `@P1` bracketed table name.
pub(crate) const HAS_IDENTITY: &str =
    "SELECT CAST(ISNULL(OBJECTPROPERTY(OBJECT_ID(@P1), 'TableHasIdentity'), 0) AS bit) AS has_identity";

/// `[schema].[name]` with closing brackets escaped.
pub(crate) fn quoted_table(schema: &str, name: &str) -> String {
    format!("[{}].[{}]", schema.replace(']', "]]"), name.replace(']', "]]"))
}

pub(crate) fn select_all(schema: &str, name: &str) -> String {
    format!("SELECT * FROM {}", quoted_table(schema, name))
}
