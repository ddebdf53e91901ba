//! # taskdeck - local-first task tracker
//!
//! Command-line front end for the task engine.
//!
//! ## Quick Start
//!
//! ```bash
//! # Capture a task with quick-add tokens
//! taskdeck add Fix login !p0 due:today 17:00 @ai +auth impact:4
//!
//! # List open tasks in the active project
//! taskdeck list
//!
//! # Track time
//! taskdeck start 3f2a
//! taskdeck stop 3f2a
//! ```
//!
//! Data is stored in `~/.taskdeck/` as one JSON file per key. Set `TASKDECK_HOME` or
//! pass `--dir` to use another location, and `RUST_LOG=debug` to see what the engine
//! is doing.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskdeck::cli::Cli;
use taskdeck::cmd::run_command;
use taskdeck::config::Config;
use taskdeck::engine::Engine;
use taskdeck::storage::FileStore;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.dir {
        config.data_dir = dir;
    }

    let store = match FileStore::open(&config.data_dir, config.quota_bytes) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open data directory {}: {}", config.data_dir.display(), e);
            std::process::exit(1);
        }
    };
    let mut engine = Engine::open(store, config.flush_interval);

    let result = run_command(&mut engine, cli.command);

    // Changes made before a failing step are still persisted.
    if let Err(e) = engine.close() {
        eprintln!("Failed to save changes: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
