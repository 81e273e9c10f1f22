//! Domain types for ssc settings and catalog rows.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Field names follow the camelCase keys of `ssc.json`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::{
    SqlColumn, SqlDataResult, SqlForeignKey, SqlIndex, SqlJob, SqlJobSchedule, SqlJobStep,
    SqlPrimaryKey, SqlTable, SqlType,
};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a connection setting (`"dev"`, `"prod"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SettingName(pub String);

impl fmt::Display for SettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SettingName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SettingName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Output categories
// ---------------------------------------------------------------------------

/// Artifact categories, one directory each under the output root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Schemas,
    Tables,
    Types,
    Views,
    Functions,
    Procs,
    Triggers,
    Data,
    Jobs,
}

impl Category {
    /// All categories in script execution order.
    pub fn all() -> &'static [Category] {
        &[
            Category::Schemas,
            Category::Tables,
            Category::Types,
            Category::Views,
            Category::Functions,
            Category::Procs,
            Category::Triggers,
            Category::Data,
            Category::Jobs,
        ]
    }

    /// Config key for this category.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Schemas => "schemas",
            Category::Tables => "tables",
            Category::Types => "types",
            Category::Views => "views",
            Category::Functions => "functions",
            Category::Procs => "procs",
            Category::Triggers => "triggers",
            Category::Data => "data",
            Category::Jobs => "jobs",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Where a category's artifacts go, or that the category is switched off.
///
/// In config files this is a subpath string or `false`. An empty string is
/// treated as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTarget", into = "RawTarget")]
pub enum CategoryTarget {
    Enabled(PathBuf),
    #[default]
    Disabled,
}

impl CategoryTarget {
    pub fn enabled(subpath: impl Into<PathBuf>) -> Self {
        CategoryTarget::Enabled(subpath.into())
    }

    pub fn subpath(&self) -> Option<&Path> {
        match self {
            CategoryTarget::Enabled(path) => Some(path.as_path()),
            CategoryTarget::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, CategoryTarget::Enabled(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Path(String),
    Flag(bool),
}

impl TryFrom<RawTarget> for CategoryTarget {
    type Error = String;

    fn try_from(raw: RawTarget) -> Result<Self, Self::Error> {
        match raw {
            RawTarget::Path(path) if path.trim().is_empty() => Ok(CategoryTarget::Disabled),
            RawTarget::Path(path) => Ok(CategoryTarget::Enabled(PathBuf::from(path))),
            RawTarget::Flag(false) => Ok(CategoryTarget::Disabled),
            RawTarget::Flag(true) => {
                Err("output directory must be a path or `false`, got `true`".to_string())
            }
        }
    }
}

impl From<CategoryTarget> for RawTarget {
    fn from(target: CategoryTarget) -> Self {
        match target {
            CategoryTarget::Enabled(path) => {
                RawTarget::Path(path.to_string_lossy().replace('\\', "/"))
            }
            CategoryTarget::Disabled => RawTarget::Flag(false),
        }
    }
}

/// Output tree configuration for one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub schemas: CategoryTarget,
    #[serde(default)]
    pub tables: CategoryTarget,
    #[serde(default)]
    pub types: CategoryTarget,
    #[serde(default)]
    pub views: CategoryTarget,
    #[serde(default)]
    pub functions: CategoryTarget,
    #[serde(default)]
    pub procs: CategoryTarget,
    #[serde(default)]
    pub triggers: CategoryTarget,
    #[serde(default)]
    pub data: CategoryTarget,
    #[serde(default)]
    pub jobs: CategoryTarget,
    /// Staging directory watched for trigger files.
    #[serde(default = "default_temps")]
    pub temps: CategoryTarget,
}

fn default_root() -> PathBuf {
    PathBuf::from("./")
}

fn default_temps() -> CategoryTarget {
    CategoryTarget::enabled("temp_files")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            schemas: CategoryTarget::Disabled,
            tables: CategoryTarget::Disabled,
            types: CategoryTarget::Disabled,
            views: CategoryTarget::Disabled,
            functions: CategoryTarget::Disabled,
            procs: CategoryTarget::Disabled,
            triggers: CategoryTarget::Disabled,
            data: CategoryTarget::Disabled,
            jobs: CategoryTarget::Disabled,
            temps: default_temps(),
        }
    }
}

impl OutputConfig {
    /// Every category enabled under its conventional folder.
    pub fn scaffold(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            schemas: CategoryTarget::enabled("./schema"),
            tables: CategoryTarget::enabled("./tables"),
            types: CategoryTarget::enabled("./types"),
            views: CategoryTarget::enabled("./views"),
            functions: CategoryTarget::enabled("./functions"),
            procs: CategoryTarget::enabled("./procs"),
            triggers: CategoryTarget::enabled("./triggers"),
            data: CategoryTarget::enabled("./data"),
            jobs: CategoryTarget::enabled("./jobs"),
            temps: default_temps(),
        }
    }

    /// Target for `category`.
    pub fn target(&self, category: Category) -> &CategoryTarget {
        match category {
            Category::Schemas => &self.schemas,
            Category::Tables => &self.tables,
            Category::Types => &self.types,
            Category::Views => &self.views,
            Category::Functions => &self.functions,
            Category::Procs => &self.procs,
            Category::Triggers => &self.triggers,
            Category::Data => &self.data,
            Category::Jobs => &self.jobs,
        }
    }

    /// Absolute-or-relative staging directory, `None` when disabled.
    pub fn staging_dir(&self) -> Option<PathBuf> {
        self.temps.subpath().map(|sub| self.root.join(sub))
    }
}

// ---------------------------------------------------------------------------
// Rendering policies
// ---------------------------------------------------------------------------

/// Line-ending policy applied to artifact bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
    /// Platform line ending (`\r\n` on Windows, `\n` elsewhere).
    Native,
}

impl LineEnding {
    fn separator(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
            LineEnding::Native => {
                if cfg!(windows) {
                    "\r\n"
                } else {
                    "\n"
                }
            }
        }
    }

    /// Convert every `\r\n`, `\r` or `\n` in `content` to this policy.
    pub fn apply(&self, content: &str) -> String {
        let lf = content.replace("\r\n", "\n").replace('\r', "\n");
        match self.separator() {
            "\n" => lf,
            sep => lf.replace('\n', sep),
        }
    }
}

/// Guard emitted around an object's DDL so scripts can be re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawIdempotency", into = "RawIdempotency")]
pub enum Idempotency {
    #[default]
    IfExistsDrop,
    IfNotExists,
    None,
}

impl Idempotency {
    pub fn tag(&self) -> &'static str {
        match self {
            Idempotency::IfExistsDrop => "if-exists-drop",
            Idempotency::IfNotExists => "if-not-exists",
            Idempotency::None => "none",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawIdempotency {
    Tag(String),
    Flag(bool),
}

impl TryFrom<RawIdempotency> for Idempotency {
    type Error = String;

    fn try_from(raw: RawIdempotency) -> Result<Self, Self::Error> {
        match raw {
            RawIdempotency::Tag(tag) => match tag.as_str() {
                "if-exists-drop" => Ok(Idempotency::IfExistsDrop),
                "if-not-exists" => Ok(Idempotency::IfNotExists),
                "none" | "" => Ok(Idempotency::None),
                other => Err(format!(
                    "unknown idempotency '{other}'; expected: if-exists-drop, if-not-exists, false"
                )),
            },
            RawIdempotency::Flag(false) => Ok(Idempotency::None),
            RawIdempotency::Flag(true) => Ok(Idempotency::IfExistsDrop),
        }
    }
}

impl From<Idempotency> for RawIdempotency {
    fn from(value: Idempotency) -> Self {
        match value {
            Idempotency::None => RawIdempotency::Flag(false),
            other => RawIdempotency::Tag(other.tag().to_string()),
        }
    }
}

/// Statement run before re-inserting exported table data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawIdempotency", into = "RawIdempotency")]
pub enum DataIdempotency {
    Delete,
    /// `DELETE` followed by `DBCC CHECKIDENT ... RESEED`.
    DeleteAndReseed,
    #[default]
    Truncate,
    None,
}

impl DataIdempotency {
    pub fn tag(&self) -> &'static str {
        match self {
            DataIdempotency::Delete => "delete",
            DataIdempotency::DeleteAndReseed => "delete-and-reseed",
            DataIdempotency::Truncate => "truncate",
            DataIdempotency::None => "none",
        }
    }
}

impl TryFrom<RawIdempotency> for DataIdempotency {
    type Error = String;

    fn try_from(raw: RawIdempotency) -> Result<Self, Self::Error> {
        match raw {
            RawIdempotency::Tag(tag) => match tag.as_str() {
                "delete" => Ok(DataIdempotency::Delete),
                "delete-and-reseed" => Ok(DataIdempotency::DeleteAndReseed),
                "truncate" => Ok(DataIdempotency::Truncate),
                "none" | "" => Ok(DataIdempotency::None),
                other => Err(format!(
                    "unknown data idempotency '{other}'; expected: delete, delete-and-reseed, truncate, false"
                )),
            },
            RawIdempotency::Flag(false) => Ok(DataIdempotency::None),
            RawIdempotency::Flag(true) => Ok(DataIdempotency::Truncate),
        }
    }
}

impl From<DataIdempotency> for RawIdempotency {
    fn from(value: DataIdempotency) -> Self {
        match value {
            DataIdempotency::None => RawIdempotency::Flag(false),
            other => RawIdempotency::Tag(other.tag().to_string()),
        }
    }
}

/// Per-category idempotency guards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdempotencyConfig {
    #[serde(default)]
    pub procs: Idempotency,
    #[serde(default)]
    pub views: Idempotency,
    #[serde(default)]
    pub functions: Idempotency,
    #[serde(default)]
    pub triggers: Idempotency,
    #[serde(default)]
    pub tables: Idempotency,
    #[serde(default)]
    pub types: Idempotency,
    #[serde(default)]
    pub jobs: Idempotency,
    #[serde(default)]
    pub data: DataIdempotency,
}

// ---------------------------------------------------------------------------
// Connection + catalog source
// ---------------------------------------------------------------------------

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_PORT: u16 = 1433;

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Connection coordinates for the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Require TLS on the wire. Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypt: Option<bool>,
    /// Accept the server certificate without validation. Defaults to `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_server_certificate: Option<bool>,
}

impl Connection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn encrypt(&self) -> bool {
        self.encrypt.unwrap_or(true)
    }

    pub fn trust_server_certificate(&self) -> bool {
        self.trust_server_certificate.unwrap_or(false)
    }
}

/// Where catalog metadata is read from.
///
/// A setting without a `catalog` key reads the live server named by its
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CatalogSource {
    /// The SQL Server behind the setting's connection.
    Mssql,
    /// A directory of JSON row exports (`objects.json`, `tables.json`, ...).
    Export { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Setting
// ---------------------------------------------------------------------------

/// One named connection and its output configuration. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub name: SettingName,
    pub connection: Connection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogSource>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub line_ending: LineEnding,
    /// Emit `CONSTRAINT [name]` for primary keys and column defaults.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub include_constraint_name: bool,
    /// Tables (`schema.name`) whose rows are exported to the data folder.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<String>,
    pub current_version: String,
    /// Keys ssc does not interpret, preserved on save.
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Setting {
    /// A fresh setting with every category enabled, as written by `ssc init`.
    pub fn scaffold(
        name: impl Into<SettingName>,
        connection: Connection,
        root: impl Into<PathBuf>,
        current_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            connection,
            catalog: None,
            output: OutputConfig::scaffold(root),
            idempotency: IdempotencyConfig::default(),
            line_ending: LineEnding::default(),
            include_constraint_name: true,
            data: Vec::new(),
            current_version: current_version.into(),
            extra: BTreeMap::new(),
        }
    }

    /// `true` when `schema.name` is listed for data export (case-insensitive).
    pub fn exports_data(&self, schema: &str, name: &str) -> bool {
        let qualified = format!("{schema}.{name}");
        self.data.iter().any(|t| t.trim().eq_ignore_ascii_case(&qualified))
    }
}

// ---------------------------------------------------------------------------
// Catalog rows
// ---------------------------------------------------------------------------

/// Programmable object types the generator understands.
///
/// Codes match `sys.objects.type` (trimmed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Procedure,
    View,
    TableFunction,
    InlineFunction,
    ScalarFunction,
    Trigger,
}

impl ObjectType {
    pub fn code(&self) -> &'static str {
        match self {
            ObjectType::Procedure => "P",
            ObjectType::View => "V",
            ObjectType::TableFunction => "TF",
            ObjectType::InlineFunction => "IF",
            ObjectType::ScalarFunction => "FN",
            ObjectType::Trigger => "TR",
        }
    }

    /// Output category artifacts of this type are written to.
    pub fn category(&self) -> Category {
        match self {
            ObjectType::Procedure => Category::Procs,
            ObjectType::View => Category::Views,
            ObjectType::TableFunction | ObjectType::InlineFunction | ObjectType::ScalarFunction => {
                Category::Functions
            }
            ObjectType::Trigger => Category::Triggers,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P" => Ok(ObjectType::Procedure),
            "V" => Ok(ObjectType::View),
            "TF" => Ok(ObjectType::TableFunction),
            "IF" => Ok(ObjectType::InlineFunction),
            "FN" => Ok(ObjectType::ScalarFunction),
            "TR" => Ok(ObjectType::Trigger),
            other => Err(format!(
                "unsupported object type '{other}'; expected: P, V, TF, IF, FN, TR"
            )),
        }
    }
}

/// A programmable object row (`sys.objects` joined with its module text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlObject {
    pub schema: String,
    pub name: String,
    /// Raw `sys.objects.type`, possibly space-padded (`"P "`).
    #[serde(rename = "type")]
    pub type_code: String,
    pub text: String,
}

impl SqlObject {
    /// Parsed object type, `None` for types the generator does not emit.
    pub fn object_type(&self) -> Option<ObjectType> {
        self.type_code.parse().ok()
    }
}

/// A permission grant row (`sys.database_permissions`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlPermission {
    pub schema: String,
    pub name: String,
    /// `GRANT`, `DENY`, or `GRANT_WITH_GRANT_OPTION`.
    pub state: String,
    /// `EXECUTE`, `SELECT`, ...
    pub permission: String,
    pub grantee: String,
}

/// Rows fetched in one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    pub objects: Vec<SqlObject>,
    pub permissions: Vec<SqlPermission>,
    pub tables: Vec<SqlTable>,
    pub columns: Vec<SqlColumn>,
    pub primary_keys: Vec<SqlPrimaryKey>,
    pub foreign_keys: Vec<SqlForeignKey>,
    pub indexes: Vec<SqlIndex>,
    pub types: Vec<SqlType>,
    pub data: Vec<SqlDataResult>,
    pub jobs: Vec<SqlJob>,
    pub job_steps: Vec<SqlJobStep>,
    pub job_schedules: Vec<SqlJobSchedule>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
