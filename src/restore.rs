use std::fs;
use std::path::{Path, PathBuf};

use colored::*;
use indicatif::ProgressBar;

use crate::client::SqlEndpoint;
use crate::error::DumpError;
use crate::locator::PartitionLocator;
use crate::metadata::{self, MetadataObject, ObjectKind};

/// Aggregate outcome of one restore run. Per-item failures end up here, not
/// as propagated errors; `failures` keeps the human-readable trail for the
/// final summary.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub tables_created: usize,
    pub tables_failed: usize,
    pub partitions_attached: usize,
    pub attaches_failed: usize,
    pub attaches_skipped: usize,
    pub objects_created: usize,
    pub objects_failed: usize,
    pub failures: Vec<String>,
}

impl RestoreReport {
    pub fn failed_items(&self) -> usize {
        self.tables_failed + self.attaches_failed + self.objects_failed
    }
}

/// Replays a backup tree against a live server: create the database, replay
/// table definitions, reattach partitions, then replay the remaining objects
/// with qualified names. Only the create-database step is fatal; everything
/// after is per-item recoverable.
pub struct RestoreOrchestrator<'a> {
    endpoint: &'a dyn SqlEndpoint,
    source_root: PathBuf,
    dest_root: PathBuf,
    /// Database name inside the backup tree.
    source_db: String,
    /// Database name to create and replay into; equals `source_db` unless the
    /// backup is restored under a fresh name.
    target_db: String,
    dry_run: bool,
}

impl<'a> RestoreOrchestrator<'a> {
    pub fn new(
        endpoint: &'a dyn SqlEndpoint,
        source_root: &Path,
        dest_root: &Path,
        source_db: &str,
        target_db: &str,
        dry_run: bool,
    ) -> Self {
        RestoreOrchestrator {
            endpoint,
            source_root: source_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            source_db: source_db.to_string(),
            target_db: target_db.to_string(),
            dry_run,
        }
    }

    pub fn run(&self, bar: &ProgressBar) -> Result<RestoreReport, DumpError> {
        let mut report = RestoreReport::default();

        // Nothing downstream is valid without the database existing.
        self.execute(&format!("CREATE DATABASE {}", self.target_db))?;

        let objects = self.read_metadata()?;
        let locator = PartitionLocator::new(&self.source_root, &self.dest_root, self.dry_run);

        // Tables first; views and other objects depend on them.
        let mut created_tables = Vec::new();
        for object in objects.iter().filter(|o| o.kind == ObjectKind::Table) {
            bar.set_message(format!("Creating table {}", object.object_name));
            let sql = object
                .sql
                .replacen("CREATE TABLE ", &format!("CREATE TABLE {}.", self.target_db), 1);
            match self.execute(&sql) {
                Ok(()) => {
                    report.tables_created += 1;
                    created_tables.push(object.object_name.clone());
                }
                Err(err) => {
                    report.tables_failed += 1;
                    report.failures.push(err.to_string());
                }
            }
        }

        // Attach partitions only for tables whose create succeeded.
        for object in objects.iter().filter(|o| o.kind == ObjectKind::Table) {
            let table = &object.object_name;
            if !created_tables.contains(table) {
                let skipped = PartitionLocator::new(&self.source_root, &self.dest_root, true)
                    .locate(&self.source_db, &self.target_db, table, bar)
                    .len();
                report.attaches_skipped += skipped;
                report.failures.push(
                    DumpError::OrderingPrecondition {
                        table: table.clone(),
                        count: skipped,
                    }
                    .to_string(),
                );
                continue;
            }

            bar.set_message(format!("Attaching partitions of {}", table));
            for part in locator.locate(&self.source_db, &self.target_db, table, bar) {
                let sql = format!(
                    "ALTER TABLE {}.{} ATTACH PARTITION '{}'",
                    part.database, part.table, part.partition_id
                );
                match self.execute(&sql) {
                    Ok(()) => report.partitions_attached += 1,
                    Err(err) => {
                        report.attaches_failed += 1;
                        report.failures.push(err.to_string());
                    }
                }
            }
        }

        // Remaining objects in enumeration order; no dependency resolution
        // between them. This phase runs even when every table failed.
        for object in objects.iter().filter(|o| o.kind != ObjectKind::Table) {
            bar.set_message(format!("Creating {}", object.object_name));
            let sql = object.sql.replace(
                &object.object_name,
                &format!("{}.{}", self.target_db, object.object_name),
            );
            match self.execute(&sql) {
                Ok(()) => report.objects_created += 1,
                Err(err) => {
                    report.objects_failed += 1;
                    report.failures.push(err.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Classify everything under `metadata/<source-db>` in enumeration order.
    /// An unreadable metadata directory is fatal: there is nothing to replay.
    fn read_metadata(&self) -> Result<Vec<MetadataObject>, DumpError> {
        let dir = self.source_root.join("metadata").join(&self.source_db);
        let entries = fs::read_dir(&dir).map_err(|e| DumpError::copy(&dir, e.to_string()))?;

        let mut objects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DumpError::copy(&dir, e.to_string()))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let content =
                fs::read_to_string(&path).map_err(|e| DumpError::copy(&path, e.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            objects.push(metadata::classify(&content, &file_name));
        }
        Ok(objects)
    }

    fn execute(&self, sql: &str) -> Result<(), DumpError> {
        if self.dry_run {
            println!("{} {}", "i".yellow().bold(), sql);
            return Ok(());
        }
        self.endpoint.execute(sql)
    }
}
