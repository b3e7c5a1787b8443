mod catalog;
mod cli;
mod client;
mod error;
mod locator;
mod metadata;
mod ops;
mod restore;
mod snapshot;
mod utils;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use ops::{BackupParams, RestoreParams};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Backup {
            host,
            port,
            database,
            source,
            dest,
            dry_run,
            no_cleanup,
        } => ops::do_backup(BackupParams {
            host,
            port,
            database,
            source,
            dest,
            dry_run,
            no_cleanup,
        }),
        Commands::Restore {
            host,
            port,
            database,
            target_database,
            source,
            dest,
            dry_run,
        } => ops::do_restore(RestoreParams {
            host,
            port,
            database,
            target_database,
            source,
            dest,
            dry_run,
        }),
    }
}
