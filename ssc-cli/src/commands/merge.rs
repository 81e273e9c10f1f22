//! `ssc merge`: rebuild the current version's bundle.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use ssc_renderer::Renderer;
use ssc_sync::merge_version;

use super::load_config;

/// Arguments for `ssc merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Setting to merge (defaults to the first configured setting).
    pub name: Option<String>,
}

impl MergeArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let setting = config.setting(self.name.as_deref())?;
        let renderer = Renderer::new().context("failed to load templates")?;

        let report = merge_version(setting, &renderer, &setting.current_version).with_context(|| {
            format!("merge failed for '{}' version {}", setting.name, setting.current_version)
        })?;

        println!(
            "{} Merged {} fragments into {}",
            "✓".green().bold(),
            report.fragments,
            report.path.display()
        );
        Ok(())
    }
}
