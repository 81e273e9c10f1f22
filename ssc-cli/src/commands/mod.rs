pub mod bump;
pub mod init;
pub mod list;
pub mod merge;
pub mod pull;
pub mod start;

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use ssc_core::Config;

pub(crate) fn load_config(path: &Path) -> Result<Config> {
    Config::load_at(path).with_context(|| format!("failed to load settings from {}", path.display()))
}

/// Run one catalog round-trip on a throwaway current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
