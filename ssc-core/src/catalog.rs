//! Catalog rows for tables, user types, table data, and agent jobs.
//!
//! Each row mirrors one result row of the corresponding catalog query.
//! Integer columns are widened to `i32`/`i64` so every source can fill them.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// A user table (`sys.tables`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlTable {
    pub object_id: i32,
    pub schema: String,
    pub name: String,
}

/// A column of a table or table type (`sys.columns`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlColumn {
    pub object_id: i32,
    pub name: String,
    pub datatype: String,
    /// Byte length; `-1` for `(max)` types.
    #[serde(default)]
    pub max_length: i32,
    #[serde(default)]
    pub precision: i32,
    #[serde(default)]
    pub scale: i32,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_identity: bool,
    #[serde(default)]
    pub is_computed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment_value: Option<i64>,
    /// Expression of a computed column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_name: Option<String>,
    /// Default constraint expression, e.g. `((0))`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_definition: Option<String>,
}

/// One column of a primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlPrimaryKey {
    pub object_id: i32,
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub is_descending_key: bool,
    /// `CLUSTERED` or `NONCLUSTERED`.
    #[serde(rename = "type")]
    pub type_desc: String,
}

/// One column pair of a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlForeignKey {
    pub object_id: i32,
    pub name: String,
    pub schema: String,
    pub table: String,
    pub column: String,
    pub reference_schema: String,
    pub reference_table: String,
    pub reference_column: String,
    /// `NO_ACTION`, `CASCADE`, `SET_NULL` or `SET_DEFAULT`.
    #[serde(default)]
    pub delete_action: String,
    #[serde(default)]
    pub update_action: String,
}

/// One column of a non-primary-key index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlIndex {
    pub object_id: i32,
    pub index_id: i32,
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub is_descending_key: bool,
    #[serde(default)]
    pub is_included_column: bool,
    #[serde(default)]
    pub is_unique: bool,
    /// `CLUSTERED` or `NONCLUSTERED`.
    #[serde(rename = "type")]
    pub type_desc: String,
}

// ---------------------------------------------------------------------------
// User types
// ---------------------------------------------------------------------------

/// A user-defined alias type or table type (`sys.types`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlType {
    pub schema: String,
    pub name: String,
    /// Base system type of an alias type.
    #[serde(default)]
    pub system_type: String,
    #[serde(default)]
    pub max_length: i32,
    #[serde(default)]
    pub precision: i32,
    #[serde(default)]
    pub scale: i32,
    #[serde(default)]
    pub is_nullable: bool,
    /// `TT` for table types, absent for alias types.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_code: Option<String>,
    /// `sys.table_types.type_table_object_id`, owner of the table type's columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i32>,
}

impl SqlType {
    pub fn is_table_type(&self) -> bool {
        self.type_code
            .as_deref()
            .is_some_and(|code| code.trim().eq_ignore_ascii_case("TT"))
    }
}

// ---------------------------------------------------------------------------
// Table data
// ---------------------------------------------------------------------------

/// A single cell of exported table data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Hex-encoded bytes.
    Binary { binary: String },
    Text(String),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(v) => f.write_str(if *v { "1" } else { "0" }),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Binary { binary } => write!(f, "0x{binary}"),
            SqlValue::Text(v) => write!(f, "N'{}'", v.replace('\'', "''")),
        }
    }
}

/// Every row of one table selected for data export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlDataResult {
    pub schema: String,
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<SqlValue>>,
    #[serde(default)]
    pub has_identity: bool,
}

// ---------------------------------------------------------------------------
// Agent jobs
// ---------------------------------------------------------------------------

/// A SQL Agent job (`msdb.dbo.sysjobs`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlJob {
    pub job_id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One step of an agent job (`msdb.dbo.sysjobsteps`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlJobStep {
    pub job_id: String,
    pub step_id: i32,
    pub step_name: String,
    pub subsystem: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(default = "default_success_action")]
    pub on_success_action: i32,
    #[serde(default)]
    pub on_success_step_id: i32,
    #[serde(default = "default_fail_action")]
    pub on_fail_action: i32,
    #[serde(default)]
    pub on_fail_step_id: i32,
    #[serde(default)]
    pub retry_attempts: i32,
    #[serde(default)]
    pub retry_interval: i32,
}

fn default_success_action() -> i32 {
    1
}

fn default_fail_action() -> i32 {
    2
}

/// A schedule attached to an agent job (`msdb.dbo.sysschedules`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlJobSchedule {
    pub job_id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub freq_type: i32,
    #[serde(default)]
    pub freq_interval: i32,
    #[serde(default)]
    pub freq_subday_type: i32,
    #[serde(default)]
    pub freq_subday_interval: i32,
    #[serde(default)]
    pub freq_relative_interval: i32,
    #[serde(default)]
    pub freq_recurrence_factor: i32,
    #[serde(default)]
    pub active_start_date: i32,
    #[serde(default)]
    pub active_end_date: i32,
    #[serde(default)]
    pub active_start_time: i32,
    #[serde(default)]
    pub active_end_time: i32,
}
