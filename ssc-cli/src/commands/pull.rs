//! `ssc pull` and `ssc pull-single`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use ssc_catalog::{fetch_object, fetch_snapshot, SnapshotScope};
use ssc_core::ObjectType;
use ssc_renderer::Renderer;
use ssc_sync::{pull, regenerate};

use super::{block_on, load_config};

/// Arguments for `ssc pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Setting to pull (defaults to the first configured setting).
    pub name: Option<String>,
}

impl PullArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let setting = config.setting(self.name.as_deref())?;
        let catalog = ssc_catalog::open(setting)?;

        let snapshot = block_on(fetch_snapshot(
            catalog.as_ref(),
            &SnapshotScope::for_setting(setting),
            setting.connection.request_timeout(),
        ))?
        .with_context(|| format!("failed to read catalog for '{}'", setting.name))?;

        let renderer = Renderer::new().context("failed to load templates")?;
        let report = pull(setting, &renderer, &snapshot)
            .with_context(|| format!("pull failed for '{}'", setting.name))?;

        println!("{} Successfully {}", "✓".green().bold(), report.stats);
        if report.skipped > 0 {
            println!("  {} unsupported catalog rows skipped", report.skipped);
        }
        if report.failed > 0 {
            bail!("{} objects could not be generated; see log for details", report.failed);
        }
        Ok(())
    }
}

/// Arguments for `ssc pull-single`.
#[derive(Args, Debug)]
pub struct PullSingleArgs {
    /// Setting to use (defaults to the first configured setting).
    pub name: Option<String>,

    /// Object name, e.g. `usp_GetUser`.
    #[arg(long = "objname", value_name = "NAME")]
    pub object_name: String,

    /// Object type code: P, V, TF, IF, FN or TR.
    #[arg(long = "type", value_name = "TYPE")]
    pub object_type: ObjectType,
}

impl PullSingleArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let setting = config.setting(self.name.as_deref())?;
        let catalog = ssc_catalog::open(setting)?;

        let fetched = block_on(fetch_object(
            catalog.as_ref(),
            self.object_type,
            &self.object_name,
            setting.connection.request_timeout(),
        ))?
        .with_context(|| format!("failed to fetch {}.{}", self.object_name, self.object_type))?;

        let renderer = Renderer::new().context("failed to load templates")?;
        let report = regenerate(setting, &renderer, &fetched.object, &fetched.permissions)
            .with_context(|| format!("failed to regenerate '{}'", self.object_name))?;

        println!("{} Successfully {}", "✓".green().bold(), report.stats);
        println!(
            "  merged {} fragments into {}",
            report.merge.fragments,
            report.merge.path.display()
        );
        Ok(())
    }
}
