//! `ssc start`: watch mode.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ssc_daemon::{start_blocking, WatchTarget};

use super::load_config;

/// Arguments for `ssc start`.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Setting to watch (all configured settings when omitted).
    pub name: Option<String>,
}

impl StartArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = load_config(config_path)?;
        let settings = match self.name.as_deref() {
            Some(name) => vec![config.setting(Some(name))?.clone()],
            None => config.settings().to_vec(),
        };

        let targets = settings
            .into_iter()
            .map(|setting| {
                let catalog = ssc_catalog::open(&setting)
                    .with_context(|| format!("cannot watch '{}'", setting.name))?;
                Ok(WatchTarget {
                    setting,
                    catalog: Arc::from(catalog),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        start_blocking(targets).context("watch mode exited with error")
    }
}
