use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use colored::*;
use comfy_table::{Attribute, Cell, ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalog::PartitionCatalog;
use crate::client::HttpEndpoint;
use crate::error::DumpError;
use crate::restore::{RestoreOrchestrator, RestoreReport};
use crate::snapshot::{FREEZE_LABEL, SnapshotWriter};

const DEFAULT_SERVER_ROOT: &str = "/var/lib/clickhouse";

pub struct BackupParams {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub source: Option<PathBuf>,
    pub dest: PathBuf,
    pub dry_run: bool,
    pub no_cleanup: bool,
}

pub struct RestoreParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub target_database: Option<String>,
    pub source: PathBuf,
    pub dest: Option<PathBuf>,
    pub dry_run: bool,
}

pub fn do_backup(params: BackupParams) -> Result<()> {
    let source = params
        .source
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_ROOT));
    check_directories(&[&source, &params.dest])?;

    let endpoint = HttpEndpoint::connect(&params.host, params.port)?;
    let catalog = PartitionCatalog::new(&endpoint);
    let writer = SnapshotWriter::new(&endpoint, &source, &params.dest, params.dry_run);

    let databases = match &params.database {
        Some(db) => vec![db.clone()],
        None => catalog.list_databases()?,
    };

    let bar = create_progress_bar("Creating backup");
    let mut discovered = 0usize;
    let mut frozen = 0usize;
    let mut copied = 0usize;
    let mut failures: Vec<String> = Vec::new();

    for database in &databases {
        bar.set_message(format!("Searching partitions of {}", database));
        let partitions = match catalog.list_partitions(database) {
            Ok(parts) => parts,
            Err(err) => {
                // One unreadable database does not abort the others.
                failures.push(err.to_string());
                continue;
            }
        };
        discovered += partitions.len();

        for part in &partitions {
            bar.set_message(format!(
                "Freezing {}.{} partition {}",
                part.database, part.table, part.partition_id
            ));
            if let Err(err) = writer.freeze(part) {
                failures.push(err.to_string());
                continue;
            }
            if writer.dry_run() {
                continue;
            }
            frozen += 1;
            match writer.materialize(part, &bar) {
                Ok(()) => copied += 1,
                Err(err) => failures.push(err.to_string()),
            }
        }
    }

    if !params.no_cleanup && !params.dry_run {
        let staging = source.join("shadow").join(FREEZE_LABEL);
        bar.set_message(format!("Cleaning up {}", staging.display()));
        if staging.exists() {
            if let Err(err) = fs::remove_dir_all(&staging) {
                failures.push(format!("cleanup of {} failed: {}", staging.display(), err));
            }
        }
    }

    bar.finish_with_message("Backup finished");
    print_backup_summary(discovered, frozen, copied, &failures);
    finish(failures.len())
}

pub fn do_restore(params: RestoreParams) -> Result<()> {
    let dest = params
        .dest
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_ROOT));
    check_directories(&[&params.source, &dest])?;

    let target = params
        .target_database
        .clone()
        .unwrap_or_else(|| params.database.clone());

    let endpoint = HttpEndpoint::connect(&params.host, params.port)?;
    let orchestrator = RestoreOrchestrator::new(
        &endpoint,
        &params.source,
        &dest,
        &params.database,
        &target,
        params.dry_run,
    );

    let bar = create_progress_bar(&format!("Restoring {}", target));
    let report = orchestrator.run(&bar)?;
    bar.finish_with_message("Restore finished");

    print_restore_summary(&report);
    finish(report.failed_items())
}

/// Fatal configuration check, run before any mutation.
fn check_directories(directories: &[&Path]) -> Result<()> {
    for dir in directories {
        if !dir.is_dir() {
            return Err(
                DumpError::Config(format!("directory {} not found", dir.display())).into(),
            );
        }
    }
    Ok(())
}

fn finish(failure_count: usize) -> Result<()> {
    if failure_count > 0 {
        Err(anyhow!("finished with {} failure(s)", failure_count))
    } else {
        println!("{} {}", "✔".green().bold(), "Done".green());
        Ok(())
    }
}

fn print_backup_summary(discovered: usize, frozen: usize, copied: usize, failures: &[String]) {
    for failure in failures {
        eprintln!("{} {}: {}", "!".yellow().bold(), "Warning".yellow(), failure);
    }

    let mut table = summary_table();
    table.add_row(vec![
        Cell::new("Partitions discovered"),
        Cell::new(discovered),
    ]);
    table.add_row(vec![Cell::new("Partitions frozen"), Cell::new(frozen)]);
    table.add_row(vec![Cell::new("Partitions copied"), Cell::new(copied)]);
    table.add_row(vec![Cell::new("Failures"), Cell::new(failures.len())]);
    println!("{}", table);
}

fn print_restore_summary(report: &RestoreReport) {
    for failure in &report.failures {
        eprintln!("{} {}: {}", "!".yellow().bold(), "Warning".yellow(), failure);
    }

    let mut table = summary_table();
    table.add_row(vec![
        Cell::new("Tables created"),
        Cell::new(report.tables_created),
    ]);
    table.add_row(vec![
        Cell::new("Tables failed"),
        Cell::new(report.tables_failed),
    ]);
    table.add_row(vec![
        Cell::new("Partitions attached"),
        Cell::new(report.partitions_attached),
    ]);
    table.add_row(vec![
        Cell::new("Attaches failed"),
        Cell::new(report.attaches_failed),
    ]);
    table.add_row(vec![
        Cell::new("Attaches skipped"),
        Cell::new(report.attaches_skipped),
    ]);
    table.add_row(vec![
        Cell::new("Other objects created"),
        Cell::new(report.objects_created),
    ]);
    table.add_row(vec![
        Cell::new("Other objects failed"),
        Cell::new(report.objects_failed),
    ]);
    println!("{}", table);
}

fn summary_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Result").add_attribute(Attribute::Bold),
            Cell::new("Count").add_attribute(Attribute::Bold),
        ]);
    table
}

fn create_progress_bar(prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    bar.set_message(prefix.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}
