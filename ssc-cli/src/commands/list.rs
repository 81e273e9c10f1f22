//! `ssc list`: configured settings.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ssc_core::Setting;

use super::load_config;

const MASK: &str = "****";

/// Arguments for `ssc list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
struct SettingRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "server")]
    server: String,
    #[tabled(rename = "database")]
    database: String,
    #[tabled(rename = "user")]
    user: String,
    #[tabled(rename = "password")]
    password: String,
    #[tabled(rename = "version")]
    current_version: String,
    #[tabled(rename = "root")]
    root: String,
}

impl From<&Setting> for SettingRow {
    fn from(setting: &Setting) -> Self {
        let connection = &setting.connection;
        let server = match connection.port {
            Some(port) => format!("{},{port}", connection.server),
            None => connection.server.clone(),
        };
        Self {
            name: setting.name.to_string(),
            server,
            database: connection.database.clone(),
            user: connection.user.clone(),
            password: if connection.password.is_empty() {
                String::new()
            } else {
                MASK.to_string()
            },
            current_version: setting.current_version.clone(),
            root: setting.output.root.display().to_string(),
        }
    }
}

impl ListArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let rows: Vec<SettingRow> = config.settings().iter().map(SettingRow::from).collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        if rows.is_empty() {
            println!("No settings defined in {}", config.path().display().to_string().yellow());
            return Ok(());
        }

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
