//! upkeep - transactional file updates and a bounded source cache
//!
//! upkeep provides:
//! - All-or-nothing application of multi-file change plans
//! - Automatic rollback from backups when a plan fails mid-flight
//! - A size- and count-bounded cache of fetched sources with LRU eviction
//! - Stable, collision-safe cache entry naming

use anyhow::Result;
use clap::Parser;

use upkeep::cli;

fn main() -> Result<()> {
    // Check for unsupported platforms
    #[cfg(windows)]
    {
        eprintln!("Error: Windows is not supported. Please use WSL (not guaranteed to work).");
        std::process::exit(1);
    }

    let cli = cli::Cli::parse();
    cli::run(cli)
}
