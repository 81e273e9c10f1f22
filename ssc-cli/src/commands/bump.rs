//! `ssc bump`: set a setting's current version.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::load_config;

/// Arguments for `ssc bump`.
#[derive(Args, Debug)]
pub struct BumpArgs {
    /// Setting to bump (defaults to the first configured setting).
    #[arg(long = "conn", value_name = "NAME")]
    pub conn: Option<String>,

    /// New value for `currentVersion`.
    #[arg(long = "newversion", value_name = "VERSION")]
    pub new_version: String,
}

impl BumpArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let mut config = load_config(config_path)?;
        let previous = config
            .bump(self.conn.as_deref(), &self.new_version)
            .with_context(|| format!("failed to bump {}", config_path.display()))?;
        let name = config.setting(self.conn.as_deref())?.name.to_string();

        println!(
            "{} '{}' bumped from {} to {}",
            "✓".green().bold(),
            name,
            previous,
            self.new_version.bold()
        );
        Ok(())
    }
}
