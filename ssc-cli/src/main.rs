//! ssc: generate SQL Server object scripts from a catalog and keep them in sync.
//!
//! # Usage
//!
//! ```text
//! ssc [--config <path>] init [--force] [--connections-file] [--server <host>] [--database <db>] ...
//! ssc [--config <path>] pull [name]
//! ssc [--config <path>] pull-single [name] --objname <object> --type <P|V|TF|IF|FN|TR>
//! ssc [--config <path>] merge [name]
//! ssc [--config <path>] start [name]
//! ssc [--config <path>] list [--json]
//! ssc [--config <path>] bump [--conn <name>] --newversion <version>
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    bump::BumpArgs,
    init::InitArgs,
    list::ListArgs,
    merge::MergeArgs,
    pull::{PullArgs, PullSingleArgs},
    start::StartArgs,
};
use ssc_core::DEFAULT_CONFIG_FILE;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ssc",
    version,
    about = "Generate and incrementally sync SQL object scripts",
    long_about = None,
)]
struct Cli {
    /// Config file to read settings from.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a starter config with every category enabled.
    Init(InitArgs),

    /// Fetch every object and reconcile the current script tree.
    Pull(PullArgs),

    /// Regenerate one object into the current and version trees, then merge.
    PullSingle(PullSingleArgs),

    /// Rebuild the current version's bundle from its fragments.
    Merge(MergeArgs),

    /// Watch staging directories for trigger files until ctrl-c.
    Start(StartArgs),

    /// List configured settings.
    List(ListArgs),

    /// Set a setting's current version.
    Bump(BumpArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    ssc_daemon::init_tracing();
    match cli.command {
        Commands::Init(args) => args.run(&cli.config),
        Commands::Pull(args) => args.run(&cli.config),
        Commands::PullSingle(args) => args.run(&cli.config),
        Commands::Merge(args) => args.run(&cli.config),
        Commands::Start(args) => args.run(&cli.config),
        Commands::List(args) => args.run(&cli.config),
        Commands::Bump(args) => args.run(&cli.config),
    }
}
