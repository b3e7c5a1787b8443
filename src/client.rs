use std::time::Duration;

use serde_json::Value;

use crate::error::DumpError;

/// Seam between the orchestration code and the ClickHouse server.
///
/// One endpoint backs one backup or restore run. Implementations must be
/// usable from a shared reference so a future bounded worker pool can share a
/// single guarded connection.
pub trait SqlEndpoint: Send + Sync {
    /// Run a statement for its side effect (DDL, ALTER ... FREEZE/ATTACH).
    fn execute(&self, sql: &str) -> Result<(), DumpError>;

    /// Run a SELECT-like statement and return its rows as JSON objects.
    fn select(&self, sql: &str) -> Result<Vec<Value>, DumpError>;
}

/// Blocking client for the ClickHouse HTTP interface (default port 8123).
/// Queries are POSTed as the request body; result sets are requested as
/// `FORMAT JSON` and unpacked from the `data` array.
pub struct HttpEndpoint {
    url: String,
    agent: reqwest::blocking::Client,
}

impl HttpEndpoint {
    /// Build a client for `host:port` and verify the server is reachable.
    /// Any failure here is a `Connection` error: nothing downstream is worth
    /// attempting against an unreachable server.
    pub fn connect(host: &str, port: u16) -> Result<Self, DumpError> {
        let url = format!("http://{}:{}/", host, port);
        let agent = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| DumpError::Connection {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let endpoint = HttpEndpoint { url, agent };
        endpoint.ping()?;
        Ok(endpoint)
    }

    fn ping(&self) -> Result<(), DumpError> {
        self.send("SELECT 1").map_err(|e| DumpError::Connection {
            url: self.url.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    fn send(&self, sql: &str) -> Result<String, DumpError> {
        let response = self
            .agent
            .post(&self.url)
            .body(sql.to_string())
            .send()
            .map_err(|e| DumpError::query(sql, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| DumpError::query(sql, e.to_string()))?;

        if !status.is_success() {
            // The server puts its exception text in the response body.
            return Err(DumpError::query(sql, body.trim().to_string()));
        }
        Ok(body)
    }
}

impl SqlEndpoint for HttpEndpoint {
    fn execute(&self, sql: &str) -> Result<(), DumpError> {
        self.send(sql).map(|_| ())
    }

    fn select(&self, sql: &str) -> Result<Vec<Value>, DumpError> {
        let body = self.send(&format!("{} FORMAT JSON", sql.trim_end_matches(';')))?;
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| DumpError::query(sql, format!("bad JSON response: {}", e)))?;
        match parsed.get("data") {
            Some(Value::Array(rows)) => Ok(rows.clone()),
            _ => Err(DumpError::query(sql, "response has no data array")),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use serde_json::Value;

    use super::SqlEndpoint;
    use crate::error::DumpError;

    /// Test double: records every executed statement, fails statements that
    /// contain a configured marker, and answers selects with canned rows.
    pub struct RecordingEndpoint {
        pub executed: Mutex<Vec<String>>,
        pub fail_contains: Vec<String>,
        pub rows: Vec<Value>,
    }

    impl RecordingEndpoint {
        pub fn new() -> Self {
            RecordingEndpoint {
                executed: Mutex::new(Vec::new()),
                fail_contains: Vec::new(),
                rows: Vec::new(),
            }
        }

        pub fn failing_on(markers: &[&str]) -> Self {
            RecordingEndpoint {
                fail_contains: markers.iter().map(|m| m.to_string()).collect(),
                ..Self::new()
            }
        }

        pub fn with_rows(rows: Vec<Value>) -> Self {
            RecordingEndpoint {
                rows,
                ..Self::new()
            }
        }

        pub fn statements(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    impl SqlEndpoint for RecordingEndpoint {
        fn execute(&self, sql: &str) -> Result<(), DumpError> {
            if let Some(marker) = self.fail_contains.iter().find(|m| sql.contains(m.as_str())) {
                return Err(DumpError::query(sql, format!("injected failure on '{}'", marker)));
            }
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        fn select(&self, sql: &str) -> Result<Vec<Value>, DumpError> {
            if let Some(marker) = self.fail_contains.iter().find(|m| sql.contains(m.as_str())) {
                return Err(DumpError::query(sql, format!("injected failure on '{}'", marker)));
            }
            Ok(self.rows.clone())
        }
    }
}
