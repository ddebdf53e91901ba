use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Local-first task tracker with priority scoring and quick-add input.
/// Data lives in ~/.taskdeck unless TASKDECK_HOME or --dir says otherwise.
#[derive(Parser)]
#[command(name = "taskdeck", version, about = "Local-first task tracker")]
pub struct Cli {
    /// Directory holding the data store.
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
