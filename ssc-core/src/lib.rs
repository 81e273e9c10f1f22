//! ssc core library: settings model, catalog row types, config persistence, errors.
//!
//! - [`types`]: newtypes, output categories, settings and programmable-object rows
//! - [`catalog`]: table, type, data and job rows
//! - [`config`]: load / select / bump / save
//! - [`error`]: [`ConfigError`]

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{
    SqlColumn, SqlDataResult, SqlForeignKey, SqlIndex, SqlJob, SqlJobSchedule, SqlJobStep,
    SqlPrimaryKey, SqlTable, SqlType, SqlValue,
};
pub use config::{Config, SettingsSource, DEFAULT_CONFIG_FILE, DEFAULT_CONNECTIONS_FILE};
pub use error::ConfigError;
pub use types::{
    CatalogSnapshot, CatalogSource, Category, CategoryTarget, Connection, DataIdempotency,
    Idempotency, IdempotencyConfig, LineEnding, ObjectType, OutputConfig, Setting, SettingName,
    SqlObject, SqlPermission, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_MS,
};
