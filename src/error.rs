use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy for a backup or restore run.
///
/// `Connection` and `Config` are fatal and abort the run before (or at) the
/// first mutation. `Query` and `Copy` are recoverable: they are caught at the
/// boundary of the owning item (one partition, one table, one object) and
/// accumulated into the final report. `OrderingPrecondition` is never raised
/// across a call boundary; it records work skipped because its parent table
/// was not created.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("can't connect to clickhouse server at {url}: {message}")]
    Connection { url: String, message: String },

    #[error("{0}")]
    Config(String),

    #[error("query failed: {message} [{sql}]")]
    Query { sql: String, message: String },

    #[error("copy failed for {}: {message}", path.display())]
    Copy { path: PathBuf, message: String },

    #[error("table {table} was not created; {count} partition(s) skipped")]
    OrderingPrecondition { table: String, count: usize },
}

impl DumpError {
    pub fn copy(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DumpError::Copy {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        DumpError::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }
}
