use std::fs;
use std::path::{Path, PathBuf};

use colored::*;
use indicatif::ProgressBar;

use crate::catalog::PartitionRef;
use crate::client::SqlEndpoint;
use crate::error::DumpError;
use crate::utils::io;

/// Label the server uses to key its freeze staging directory; frozen
/// hardlinks land under `<source>/shadow/<label>/data/<db>`.
pub const FREEZE_LABEL: &str = "backup";

/// Materialized-view backing tables (`.inner.` URL-encoded) ride along with
/// the view definition and must never be copied as standalone objects.
const INNER_TABLE_PREFIX: &str = "%2Einner%2E";

/// Issues freeze commands and materializes frozen data plus metadata into
/// the backup tree. `dry_run` is an explicit field so concurrent or repeated
/// runs can never race on a process-wide switch.
pub struct SnapshotWriter<'a> {
    endpoint: &'a dyn SqlEndpoint,
    source_root: PathBuf,
    dest_root: PathBuf,
    dry_run: bool,
}

impl<'a> SnapshotWriter<'a> {
    pub fn new(
        endpoint: &'a dyn SqlEndpoint,
        source_root: &Path,
        dest_root: &Path,
        dry_run: bool,
    ) -> Self {
        SnapshotWriter {
            endpoint,
            source_root: source_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Freeze one partition under the fixed backup label. In dry-run mode the
    /// statement is printed and never sent.
    pub fn freeze(&self, part: &PartitionRef) -> Result<(), DumpError> {
        let sql = format!(
            "ALTER TABLE {}.{} FREEZE PARTITION '{}' WITH NAME '{}'",
            part.database, part.table, part.partition_id, FREEZE_LABEL
        );
        if self.dry_run {
            println!("{} {}", "i".yellow().bold(), sql);
            return Ok(());
        }
        self.endpoint.execute(&sql)
    }

    /// Copy the partition's frozen data and the database's metadata into the
    /// backup tree, then rewrite the metadata so it is replay-ready: the
    /// server stores definitions as `ATTACH ...` statements referencing
    /// existing files, the backup needs self-sufficient `CREATE ...` ones.
    ///
    /// Re-running for other partitions of the same database overwrites the
    /// same files with identical content; pre-existing directories are fine.
    pub fn materialize(&self, part: &PartitionRef, bar: &ProgressBar) -> Result<(), DumpError> {
        let part_dest = self.dest_root.join("partitions").join(&part.database);
        let meta_dest = self.dest_root.join("metadata").join(&part.database);
        for dir in [&part_dest, &meta_dest] {
            fs::create_dir_all(dir).map_err(|e| DumpError::copy(dir, e.to_string()))?;
        }

        let shadow = io::subpath(
            &self.source_root,
            &["shadow", FREEZE_LABEL, "data", &part.database],
        );
        let outcome = io::copy_dir_recursive(&shadow, &part_dest, bar, &[INNER_TABLE_PREFIX])?;
        if !outcome.ok() {
            return Err(DumpError::copy(&shadow, outcome.failures.join("; ")));
        }

        let meta_src = self.source_root.join("metadata").join(&part.database);
        let outcome = io::copy_dir_recursive(&meta_src, &meta_dest, bar, &[INNER_TABLE_PREFIX])?;
        if !outcome.ok() {
            return Err(DumpError::copy(&meta_src, outcome.failures.join("; ")));
        }

        io::rewrite_sql_files(&meta_dest, "ATTACH", "CREATE")?;
        Ok(())
    }
}
