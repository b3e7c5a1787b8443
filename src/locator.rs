use std::fs;
use std::path::{Path, PathBuf};

use colored::*;
use indicatif::ProgressBar;

use crate::catalog::PartitionRef;
use crate::utils::io;

/// The server scans this directory name for parts to attach; it is never a
/// partition of its own.
const DETACHED_DIR: &str = "detached";

/// Directory names reduce to a partition id by taking their first 6
/// characters ("202401_1_1_0" -> "202401"). Fragile but matches the trees the
/// freeze mechanism writes; see DESIGN.md.
const PART_ID_LEN: usize = 6;

/// Maps a backup tree's on-disk partition directories back to attachable
/// partition ids, staging each directory into the destination server's
/// `detached` area on the way.
pub struct PartitionLocator {
    backup_root: PathBuf,
    dest_root: PathBuf,
    dry_run: bool,
}

impl PartitionLocator {
    pub fn new(backup_root: &Path, dest_root: &Path, dry_run: bool) -> Self {
        PartitionLocator {
            backup_root: backup_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            dry_run,
        }
    }

    /// Enumerate partition directories for `table` under the tree's
    /// `source_db`, copy each into the destination server's detached staging
    /// area for `target_db`, and return the deduplicated partition set in
    /// discovery order. The two database names differ when a backup is
    /// restored under a fresh name.
    ///
    /// Multiple fragment directories of one logical partition share a prefix
    /// and collapse to a single ref (first seen wins); every fragment is
    /// still staged. An unreadable table directory yields an empty set so an
    /// empty table still restores; a fragment that fails to stage is skipped
    /// with a warning.
    pub fn locate(
        &self,
        source_db: &str,
        target_db: &str,
        table: &str,
        bar: &ProgressBar,
    ) -> Vec<PartitionRef> {
        let table_dir = io::subpath(&self.backup_root, &["partitions", source_db, table]);
        let staging = io::subpath(&self.dest_root, &["data", target_db, table, DETACHED_DIR]);

        let entries = match fs::read_dir(&table_dir) {
            Ok(entries) => entries,
            Err(err) => {
                eprintln!(
                    "{} {}: no partitions found at {}: {}",
                    "!".yellow().bold(),
                    "Warning".yellow(),
                    table_dir.display(),
                    err
                );
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    eprintln!("{} {}: {}", "!".yellow().bold(), "Warning".yellow(), err);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if !entry.path().is_dir() || name == DETACHED_DIR {
                continue;
            }

            if !self.dry_run {
                let copied =
                    io::copy_dir_recursive(&entry.path(), &staging.join(&name), bar, &[]);
                match copied {
                    Ok(outcome) if outcome.ok() => {}
                    Ok(outcome) => {
                        eprintln!(
                            "{} {}: staging {} incomplete: {}",
                            "!".yellow().bold(),
                            "Warning".yellow(),
                            name,
                            outcome.failures.join("; ")
                        );
                        continue;
                    }
                    Err(err) => {
                        eprintln!("{} {}: {}", "!".yellow().bold(), "Warning".yellow(), err);
                        continue;
                    }
                }
            }

            let part_id: String = name.chars().take(PART_ID_LEN).collect();
            let part = PartitionRef {
                database: target_db.to_string(),
                table: table.to_string(),
                partition_id: part_id,
            };
            if !found.contains(&part) {
                found.push(part);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use indicatif::ProgressBar;
    use tempfile::tempdir;

    use super::*;

    fn add_part_dir(backup: &Path, db: &str, table: &str, dir: &str) {
        let d = backup.join("partitions").join(db).join(table).join(dir);
        fs::create_dir_all(&d).unwrap();
        fs::write(d.join("data.bin"), dir.as_bytes()).unwrap();
    }

    #[test]
    fn finds_and_stages_partitions() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();
        add_part_dir(backup.path(), "shop", "orders", "202401_1_1_0");
        add_part_dir(backup.path(), "shop", "orders", "202402_3_3_0");

        let locator = PartitionLocator::new(backup.path(), dest.path(), false);
        let parts = locator.locate("shop", "shop", "orders", &ProgressBar::hidden());

        let mut ids: Vec<_> = parts.iter().map(|p| p.partition_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["202401", "202402"]);
        assert!(
            dest.path()
                .join("data/shop/orders/detached/202401_1_1_0/data.bin")
                .exists()
        );
        assert!(
            dest.path()
                .join("data/shop/orders/detached/202402_3_3_0/data.bin")
                .exists()
        );
    }

    #[test]
    fn fragments_sharing_a_prefix_collapse_to_one_ref() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();
        add_part_dir(backup.path(), "shop", "orders", "202401_1_1_0");
        add_part_dir(backup.path(), "shop", "orders", "202401_2_2_0");

        let locator = PartitionLocator::new(backup.path(), dest.path(), false);
        let parts = locator.locate("shop", "shop", "orders", &ProgressBar::hidden());

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].partition_id, "202401");
        // Both fragments are staged even though only one ref survives.
        assert!(
            dest.path()
                .join("data/shop/orders/detached/202401_1_1_0")
                .exists()
        );
        assert!(
            dest.path()
                .join("data/shop/orders/detached/202401_2_2_0")
                .exists()
        );
    }

    #[test]
    fn detached_directory_is_never_a_partition() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();
        add_part_dir(backup.path(), "shop", "orders", "detached");
        add_part_dir(backup.path(), "shop", "orders", "202401_1_1_0");

        let locator = PartitionLocator::new(backup.path(), dest.path(), false);
        let parts = locator.locate("shop", "shop", "orders", &ProgressBar::hidden());

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].partition_id, "202401");
    }

    #[test]
    fn stages_under_the_target_database_name() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();
        add_part_dir(backup.path(), "shop", "orders", "202401_1_1_0");

        let locator = PartitionLocator::new(backup.path(), dest.path(), false);
        let parts = locator.locate("shop", "shop_restored", "orders", &ProgressBar::hidden());

        assert_eq!(parts[0].database, "shop_restored");
        assert!(
            dest.path()
                .join("data/shop_restored/orders/detached/202401_1_1_0/data.bin")
                .exists()
        );
    }

    #[test]
    fn missing_table_directory_yields_empty_set() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();

        let locator = PartitionLocator::new(backup.path(), dest.path(), false);
        assert!(locator.locate("shop", "shop", "empty", &ProgressBar::hidden()).is_empty());
    }

    #[test]
    fn locate_is_idempotent() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();
        add_part_dir(backup.path(), "shop", "orders", "202402_3_3_0");
        add_part_dir(backup.path(), "shop", "orders", "202401_1_1_0");

        let locator = PartitionLocator::new(backup.path(), dest.path(), false);
        let first = locator.locate("shop", "shop", "orders", &ProgressBar::hidden());
        let second = locator.locate("shop", "shop", "orders", &ProgressBar::hidden());
        assert_eq!(first, second);
    }

    #[test]
    fn short_directory_names_are_taken_whole() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();
        add_part_dir(backup.path(), "shop", "orders", "all");

        let locator = PartitionLocator::new(backup.path(), dest.path(), false);
        let parts = locator.locate("shop", "shop", "orders", &ProgressBar::hidden());
        assert_eq!(parts[0].partition_id, "all");
    }

    #[test]
    fn dry_run_lists_without_staging() {
        let backup = tempdir().unwrap();
        let dest = tempdir().unwrap();
        add_part_dir(backup.path(), "shop", "orders", "202401_1_1_0");

        let locator = PartitionLocator::new(backup.path(), dest.path(), true);
        let parts = locator.locate("shop", "shop", "orders", &ProgressBar::hidden());

        assert_eq!(parts.len(), 1);
        assert!(!dest.path().join("data").exists());
    }
}
