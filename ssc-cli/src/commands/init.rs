//! `ssc init`: write a starter config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use ssc_core::{
    Config, Connection, Setting, DEFAULT_CONNECTIONS_FILE, DEFAULT_PORT,
    DEFAULT_REQUEST_TIMEOUT_MS,
};

/// Arguments for `ssc init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,

    /// Keep settings in a separate connections file referenced by the config.
    #[arg(long = "connections-file")]
    pub connections_file: bool,

    /// Name of the first setting.
    #[arg(long, default_value = "dev")]
    pub name: String,

    #[arg(long, default_value = "localhost")]
    pub server: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, default_value = "database")]
    pub database: String,

    #[arg(long, default_value = "username")]
    pub user: String,

    #[arg(long, default_value = "super_secure_password")]
    pub password: String,

    /// Output root (defaults to the config file's directory).
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[arg(long = "current-version", value_name = "VERSION", default_value = "0.0.1")]
    pub current_version: String,
}

impl InitArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => config_dir(config_path)?,
        };
        let connection = Connection {
            server: self.server,
            port: (self.port != DEFAULT_PORT).then_some(self.port),
            database: self.database,
            user: self.user,
            password: self.password,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            encrypt: None,
            trust_server_certificate: None,
        };
        let setting = Setting::scaffold(self.name, connection, root, self.current_version);
        let staging = setting.output.staging_dir();

        let connections = self.connections_file.then(|| Path::new(DEFAULT_CONNECTIONS_FILE));
        let config = Config::init_at(config_path, connections, setting, self.force)
            .with_context(|| format!("failed to initialise {}", config_path.display()))?;

        if let Some(staging) = staging {
            std::fs::create_dir_all(&staging).with_context(|| {
                format!("failed to create staging directory {}", staging.display())
            })?;
        }

        println!("{} Wrote {}", "✓".green().bold(), config.path().display());
        if self.connections_file {
            println!("  settings are kept in {DEFAULT_CONNECTIONS_FILE}");
        }
        Ok(())
    }
}

fn config_dir(config_path: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    Ok(match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
        _ => cwd,
    })
}
