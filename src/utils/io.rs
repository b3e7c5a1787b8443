use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use walkdir::WalkDir;

use crate::error::DumpError;

/// Result of one recursive copy. Per-entry failures are collected here and
/// aggregated by the caller instead of aborting the walk, so one unreadable
/// file does not take down the whole run.
#[derive(Debug, Default)]
pub struct CopyOutcome {
    pub files: usize,
    pub failures: Vec<String>,
}

impl CopyOutcome {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Recursively copy `from` into `to`, skipping any entry whose file name
/// starts with one of `exclude_prefixes`. Destination directories are created
/// idempotently; pre-existing ones are not an error.
pub fn copy_dir_recursive(
    from: &Path,
    to: &Path,
    bar: &ProgressBar,
    exclude_prefixes: &[&str],
) -> Result<CopyOutcome, DumpError> {
    if !from.is_dir() {
        return Err(DumpError::copy(from, "source directory not found"));
    }
    fs::create_dir_all(to).map_err(|e| DumpError::copy(to, e.to_string()))?;

    let should_include = |e: &walkdir::DirEntry| {
        let name = match e.file_name().to_str() {
            Some(n) => n,
            None => return true,
        };
        !exclude_prefixes.iter().any(|p| name.starts_with(p))
    };

    let mut outcome = CopyOutcome::default();
    for entry in WalkDir::new(from).into_iter().filter_entry(should_include) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                outcome.failures.push(err.to_string());
                continue;
            }
        };
        let path = entry.path();
        let rel = match path.strip_prefix(from) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let dest = to.join(rel);

        if entry.file_type().is_dir() {
            if let Err(err) = fs::create_dir_all(&dest) {
                outcome.failures.push(format!("{}: {}", dest.display(), err));
            }
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                if let Err(err) = fs::create_dir_all(parent) {
                    outcome.failures.push(format!("{}: {}", parent.display(), err));
                    continue;
                }
            }
            match fs::copy(path, &dest) {
                Ok(_) => {
                    outcome.files += 1;
                    bar.inc(1);
                }
                Err(err) => outcome.failures.push(format!("{}: {}", path.display(), err)),
            }
        }
    }
    Ok(outcome)
}

/// Swap the statement's leading keyword if it equals `old`. Returns `None`
/// when the statement starts with anything else, including when `old` appears
/// only inside the definition body.
pub fn rewrite_statement_keyword(content: &str, old: &str, new: &str) -> Option<String> {
    let lead = content.len() - content.trim_start().len();
    let rest = &content[lead..];
    let first = rest.split_whitespace().next()?;
    if first != old {
        return None;
    }
    Some(format!("{}{}{}", &content[..lead], new, &rest[old.len()..]))
}

/// Rewrite the leading `old` keyword to `new` in every regular `*.sql` file
/// directly under `dir`. Non-SQL files are never touched. Returns the number
/// of files rewritten.
pub fn rewrite_sql_files(dir: &Path, old: &str, new: &str) -> Result<usize, DumpError> {
    let entries = fs::read_dir(dir).map_err(|e| DumpError::copy(dir, e.to_string()))?;
    let mut rewritten = 0;

    for entry in entries {
        let entry = entry.map_err(|e| DumpError::copy(dir, e.to_string()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
            continue;
        }
        let content =
            fs::read_to_string(&path).map_err(|e| DumpError::copy(&path, e.to_string()))?;
        if let Some(updated) = rewrite_statement_keyword(&content, old, new) {
            fs::write(&path, updated).map_err(|e| DumpError::copy(&path, e.to_string()))?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

/// Join a relative chain onto a root without touching the filesystem.
pub fn subpath(root: &Path, parts: &[&str]) -> PathBuf {
    parts.iter().fold(root.to_path_buf(), |p, part| p.join(part))
}
