use serde::Deserialize;

use crate::client::SqlEndpoint;
use crate::error::DumpError;

/// One logical partition inside one table. Never persisted; lives for the
/// duration of a single backup or restore run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRef {
    pub database: String,
    pub table: String,
    pub partition_id: String,
}

#[derive(Deserialize)]
struct PartRow {
    partition: String,
    table: String,
    database: String,
}

#[derive(Deserialize)]
struct DatabaseRow {
    name: String,
}

/// Discovers active partitions through `system.parts`.
pub struct PartitionCatalog<'a> {
    endpoint: &'a dyn SqlEndpoint,
}

impl<'a> PartitionCatalog<'a> {
    pub fn new(endpoint: &'a dyn SqlEndpoint) -> Self {
        PartitionCatalog { endpoint }
    }

    /// All databases on the server, minus `system`.
    pub fn list_databases(&self) -> Result<Vec<String>, DumpError> {
        let rows = self.endpoint.select("SHOW DATABASES")?;
        let mut databases = Vec::new();
        for row in rows {
            let row: DatabaseRow = serde_json::from_value(row)
                .map_err(|e| DumpError::query("SHOW DATABASES", e.to_string()))?;
            if row.name != "system" {
                databases.push(row.name);
            }
        }
        Ok(databases)
    }

    /// Active partitions for every table in `database`. Tables whose name
    /// starts with `.` are server-internal and always excluded.
    pub fn list_partitions(&self, database: &str) -> Result<Vec<PartitionRef>, DumpError> {
        let sql = format!(
            "SELECT DISTINCT partition, table, database FROM system.parts \
             WHERE active AND database = '{}'",
            database
        );
        let rows = self.endpoint.select(&sql)?;

        let mut partitions = Vec::new();
        for row in rows {
            let row: PartRow =
                serde_json::from_value(row).map_err(|e| DumpError::query(&sql, e.to_string()))?;
            if row.table.starts_with('.') {
                continue;
            }
            partitions.push(PartitionRef {
                database: row.database,
                table: row.table,
                partition_id: row.partition,
            });
        }
        Ok(partitions)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::client::testing::RecordingEndpoint;

    #[test]
    fn lists_partitions_and_filters_internal_tables() {
        let endpoint = RecordingEndpoint::with_rows(vec![
            json!({"partition": "202401", "table": "orders", "database": "shop"}),
            json!({"partition": "202401", "table": ".inner.orders_mv", "database": "shop"}),
            json!({"partition": "202402", "table": "orders", "database": "shop"}),
        ]);
        let catalog = PartitionCatalog::new(&endpoint);

        let parts = catalog.list_partitions("shop").unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.table == "orders"));
        assert_eq!(parts[0].partition_id, "202401");
        assert_eq!(parts[1].partition_id, "202402");
    }

    #[test]
    fn database_list_excludes_system() {
        let endpoint = RecordingEndpoint::with_rows(vec![
            json!({"name": "shop"}),
            json!({"name": "system"}),
            json!({"name": "metrics"}),
        ]);
        let catalog = PartitionCatalog::new(&endpoint);

        assert_eq!(catalog.list_databases().unwrap(), vec!["shop", "metrics"]);
    }

    #[test]
    fn query_failure_surfaces_as_error() {
        let endpoint = RecordingEndpoint::failing_on(&["system.parts"]);
        let catalog = PartitionCatalog::new(&endpoint);

        assert!(catalog.list_partitions("shop").is_err());
    }
}
