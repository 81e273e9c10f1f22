//! Template contexts: serializable payloads built from catalog rows.

use serde::Serialize;

use std::collections::BTreeMap;

use ssc_core::{
    CatalogSnapshot, DataIdempotency, Idempotency, ObjectType, SqlColumn, SqlDataResult,
    SqlForeignKey, SqlIndex, SqlJob, SqlJobSchedule, SqlJobStep, SqlObject, SqlPermission,
    SqlTable, SqlType,
};

/// Payload for `object.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectCtx {
    pub schema: String,
    pub name: String,
    pub type_code: String,
    /// DDL keyword for `DROP`: `PROCEDURE`, `VIEW`, `FUNCTION`, `TRIGGER`.
    pub keyword: &'static str,
    /// Idempotency tag (`if-exists-drop`, `if-not-exists`, `none`).
    pub guard: &'static str,
    pub definition: String,
}

impl ObjectCtx {
    pub fn new(object: &SqlObject, object_type: ObjectType, guard: Idempotency) -> Self {
        Self {
            schema: object.schema.clone(),
            name: object.name.clone(),
            type_code: object_type.code().to_string(),
            keyword: keyword(object_type),
            guard: guard.tag(),
            definition: object.text.trim().to_string(),
        }
    }
}

fn keyword(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Procedure => "PROCEDURE",
        ObjectType::View => "VIEW",
        ObjectType::TableFunction | ObjectType::InlineFunction | ObjectType::ScalarFunction => {
            "FUNCTION"
        }
        ObjectType::Trigger => "TRIGGER",
    }
}

/// One grant line in `permissions.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct GrantCtx {
    /// `GRANT`, `DENY` or `REVOKE`.
    pub action: String,
    pub permission: String,
    pub schema: String,
    pub name: String,
    pub grantee: String,
    pub with_grant_option: bool,
}

impl From<&SqlPermission> for GrantCtx {
    fn from(row: &SqlPermission) -> Self {
        // `state_desc` values, or the single-letter `state` codes.
        let (action, with_grant_option) = match row.state.trim().to_ascii_uppercase().as_str() {
            "GRANT_WITH_GRANT_OPTION" | "W" => ("GRANT".to_string(), true),
            "G" => ("GRANT".to_string(), false),
            "D" => ("DENY".to_string(), false),
            "R" => ("REVOKE".to_string(), false),
            other => (other.to_string(), false),
        };
        Self {
            action,
            permission: row.permission.trim().to_string(),
            schema: row.schema.clone(),
            name: row.name.clone(),
            grantee: row.grantee.clone(),
            with_grant_option,
        }
    }
}

/// Payload for `permissions.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionsCtx {
    pub grants: Vec<GrantCtx>,
}

/// Payload for `schema.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaCtx {
    pub schema: String,
}

/// Payload for `audit_header.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct AuditCtx {
    pub name: String,
    pub version: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Tables and types
// ---------------------------------------------------------------------------

/// Payload for `table.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct TableCtx {
    pub schema: String,
    pub name: String,
    pub guard: &'static str,
    /// Rendered column definitions, in column order.
    pub columns: Vec<String>,
    pub primary_key: Option<KeyCtx>,
    pub foreign_keys: Vec<ForeignKeyCtx>,
    pub indexes: Vec<IndexCtx>,
}

/// Primary key clause.
#[derive(Debug, Clone, Serialize)]
pub struct KeyCtx {
    /// `None` renders an unnamed constraint.
    pub name: Option<String>,
    /// `CLUSTERED` or `NONCLUSTERED`.
    pub kind: String,
    pub columns: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKeyCtx {
    pub name: String,
    pub columns: String,
    pub reference_schema: String,
    pub reference_table: String,
    pub reference_columns: String,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexCtx {
    pub name: String,
    pub unique: bool,
    pub kind: String,
    pub columns: String,
    /// Empty when the index has no `INCLUDE` list.
    pub included: String,
}

impl TableCtx {
    pub fn new(
        table: &SqlTable,
        snapshot: &CatalogSnapshot,
        guard: Idempotency,
        include_constraint_name: bool,
    ) -> Self {
        let columns = snapshot
            .columns
            .iter()
            .filter(|c| c.object_id == table.object_id)
            .map(|c| column_definition(c, include_constraint_name))
            .collect();

        let pk_rows: Vec<_> =
            snapshot.primary_keys.iter().filter(|k| k.object_id == table.object_id).collect();
        let primary_key = pk_rows.first().map(|first| KeyCtx {
            name: include_constraint_name.then(|| first.name.clone()),
            kind: first.type_desc.trim().to_ascii_uppercase(),
            columns: join(pk_rows.iter().map(|k| ordered(&k.column, k.is_descending_key))),
        });

        Self {
            schema: table.schema.clone(),
            name: table.name.clone(),
            guard: guard.tag(),
            columns,
            primary_key,
            foreign_keys: foreign_keys(table, &snapshot.foreign_keys),
            indexes: indexes(table, &snapshot.indexes),
        }
    }
}

fn foreign_keys(table: &SqlTable, rows: &[SqlForeignKey]) -> Vec<ForeignKeyCtx> {
    let mut grouped: BTreeMap<&str, Vec<&SqlForeignKey>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.object_id == table.object_id) {
        grouped.entry(row.name.as_str()).or_default().push(row);
    }
    grouped
        .into_iter()
        .map(|(name, rows)| {
            let first = rows[0];
            ForeignKeyCtx {
                name: name.to_string(),
                columns: join(rows.iter().map(|r| bracket(&r.column))),
                reference_schema: first.reference_schema.clone(),
                reference_table: first.reference_table.clone(),
                reference_columns: join(rows.iter().map(|r| bracket(&r.reference_column))),
                on_delete: referential_action(&first.delete_action),
                on_update: referential_action(&first.update_action),
            }
        })
        .collect()
}

fn indexes(table: &SqlTable, rows: &[SqlIndex]) -> Vec<IndexCtx> {
    let mut grouped: BTreeMap<&str, Vec<&SqlIndex>> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.object_id == table.object_id) {
        grouped.entry(row.name.as_str()).or_default().push(row);
    }
    grouped
        .into_iter()
        .map(|(name, rows)| {
            let first = rows[0];
            IndexCtx {
                name: name.to_string(),
                unique: first.is_unique,
                kind: first.type_desc.trim().to_ascii_uppercase(),
                columns: join(
                    rows.iter()
                        .filter(|r| !r.is_included_column)
                        .map(|r| ordered(&r.column, r.is_descending_key)),
                ),
                included: join(
                    rows.iter().filter(|r| r.is_included_column).map(|r| bracket(&r.column)),
                ),
            }
        })
        .collect()
}

/// `NO_ACTION` is the server default and is left out.
fn referential_action(action: &str) -> Option<String> {
    match action.trim().to_ascii_uppercase().as_str() {
        "" | "NO_ACTION" => None,
        other => Some(other.replace('_', " ")),
    }
}

/// Payload for `type.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct TypeCtx {
    pub schema: String,
    pub name: String,
    pub guard: &'static str,
    pub table_type: bool,
    /// Base type of an alias type, e.g. `[nvarchar](50)`.
    pub base: String,
    pub nullable: bool,
    pub columns: Vec<String>,
}

impl TypeCtx {
    pub fn new(ty: &SqlType, columns: &[SqlColumn], guard: Idempotency) -> Self {
        let table_type = ty.is_table_type();
        let columns = match ty.object_id {
            Some(id) if table_type => columns
                .iter()
                .filter(|c| c.object_id == id)
                // table types reject named constraints
                .map(|c| column_definition(c, false))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            schema: ty.schema.clone(),
            name: ty.name.clone(),
            guard: guard.tag(),
            table_type,
            base: sized_type(&ty.system_type, ty.max_length, ty.precision, ty.scale),
            nullable: ty.is_nullable,
            columns,
        }
    }
}

/// One column line of a `CREATE TABLE` or `CREATE TYPE ... AS TABLE`.
pub fn column_definition(column: &SqlColumn, include_constraint_name: bool) -> String {
    if column.is_computed {
        if let Some(formula) = &column.formula {
            return format!("{} AS {}", bracket(&column.name), formula.trim());
        }
    }

    let mut out = format!(
        "{} {}",
        bracket(&column.name),
        sized_type(&column.datatype, column.max_length, column.precision, column.scale)
    );
    if let Some(collation) = &column.collation_name {
        out.push_str(" COLLATE ");
        out.push_str(collation);
    }
    if column.is_identity {
        out.push_str(&format!(
            " IDENTITY({},{})",
            column.seed_value.unwrap_or(1),
            column.increment_value.unwrap_or(1)
        ));
    }
    out.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
    if let Some(default) = &column.default_definition {
        match &column.default_name {
            Some(name) if include_constraint_name => {
                out.push_str(&format!(" CONSTRAINT {} DEFAULT {}", bracket(name), default.trim()))
            }
            _ => out.push_str(&format!(" DEFAULT {}", default.trim())),
        }
    }
    out
}

/// Bracketed type name with its length, precision or scale suffix.
pub fn sized_type(datatype: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let lower = datatype.trim().to_ascii_lowercase();
    let name = bracket(datatype.trim());
    match lower.as_str() {
        "varchar" | "char" | "varbinary" | "binary" => {
            format!("{name}({})", length(max_length, 1))
        }
        "nvarchar" | "nchar" => format!("{name}({})", length(max_length, 2)),
        "decimal" | "numeric" => format!("{name}({precision}, {scale})"),
        "datetime2" | "time" | "datetimeoffset" => format!("{name}({scale})"),
        _ => name,
    }
}

fn length(max_length: i32, bytes_per_char: i32) -> String {
    if max_length < 0 {
        "max".to_string()
    } else {
        (max_length / bytes_per_char).to_string()
    }
}

fn bracket(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

fn ordered(column: &str, descending: bool) -> String {
    format!("{} {}", bracket(column), if descending { "DESC" } else { "ASC" })
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

// ---------------------------------------------------------------------------
// Table data
// ---------------------------------------------------------------------------

/// Payload for `data.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct DataCtx {
    pub schema: String,
    pub name: String,
    pub guard: &'static str,
    pub has_identity: bool,
    pub columns: String,
    /// Each row as a rendered `VALUES` list.
    pub rows: Vec<String>,
}

impl DataCtx {
    pub fn new(data: &SqlDataResult, guard: DataIdempotency) -> Self {
        Self {
            schema: data.schema.clone(),
            name: data.name.clone(),
            guard: guard.tag(),
            has_identity: data.has_identity,
            columns: join(data.columns.iter().map(|c| bracket(c))),
            rows: data
                .rows
                .iter()
                .map(|row| join(row.iter().map(|v| v.to_string())))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent jobs
// ---------------------------------------------------------------------------

/// Payload for `job.sql`.
#[derive(Debug, Clone, Serialize)]
pub struct JobCtx {
    pub name: String,
    pub enabled: bool,
    pub description: Option<String>,
    pub guard: &'static str,
    pub start_step_id: i32,
    pub steps: Vec<SqlJobStep>,
    pub schedules: Vec<SqlJobSchedule>,
}

impl JobCtx {
    /// Steps and schedules belonging to other jobs are ignored.
    pub fn new(
        job: &SqlJob,
        steps: &[SqlJobStep],
        schedules: &[SqlJobSchedule],
        guard: Idempotency,
    ) -> Self {
        let mut steps: Vec<SqlJobStep> =
            steps.iter().filter(|s| s.job_id == job.job_id).cloned().collect();
        steps.sort_by_key(|s| s.step_id);
        Self {
            name: job.name.clone(),
            enabled: job.enabled,
            description: job.description.clone().filter(|d| !d.trim().is_empty()),
            guard: guard.tag(),
            start_step_id: steps.first().map_or(1, |s| s.step_id),
            steps,
            schedules: schedules.iter().filter(|s| s.job_id == job.job_id).cloned().collect(),
        }
    }
}
