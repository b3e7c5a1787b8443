use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// clickhouse-dump: partition-level backup and restore for ClickHouse
#[derive(Parser, Debug)]
#[command(name = "clickhouse-dump", version, about = "Back up and restore ClickHouse table partitions via FREEZE/ATTACH.", long_about = None, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Freeze active partitions and copy them plus metadata into a backup tree
    Backup {
        /// Server hostname
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Server HTTP port
        #[arg(short = 'p', long, default_value_t = 8123)]
        port: u16,

        /// Database to back up (omit for all user databases)
        #[arg(long = "db")]
        database: Option<String>,

        /// ClickHouse data directory (defaults to /var/lib/clickhouse)
        #[arg(long = "in", value_name = "DIR")]
        source: Option<PathBuf>,

        /// Destination directory for the backup tree
        #[arg(long = "out", value_name = "DIR")]
        dest: PathBuf,

        /// Only show the freeze statements; copy nothing
        #[arg(long)]
        dry_run: bool,

        /// Keep the server-side freeze staging after the backup
        #[arg(long)]
        no_cleanup: bool,
    },

    /// Recreate a database from a backup tree and reattach its partitions
    Restore {
        /// Server hostname
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Server HTTP port
        #[arg(short = 'p', long, default_value_t = 8123)]
        port: u16,

        /// Database name inside the backup tree
        #[arg(long = "db")]
        database: String,

        /// Restore under a different database name (defaults to --db)
        #[arg(long = "target-db")]
        target_database: Option<String>,

        /// Backup tree to restore from
        #[arg(long = "in", value_name = "DIR")]
        source: PathBuf,

        /// ClickHouse data directory of the target server (defaults to /var/lib/clickhouse)
        #[arg(long = "out", value_name = "DIR")]
        dest: Option<PathBuf>,

        /// Only show the statements; execute and stage nothing
        #[arg(long)]
        dry_run: bool,
    },
}
