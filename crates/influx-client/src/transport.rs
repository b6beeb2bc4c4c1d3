//! Transport abstraction over the query and write endpoints.
//!
//! The shell and the importer only talk to the server through [`Transport`],
//! which keeps them independent of HTTP:
//!
//! - [`Client`](crate::Client): HTTP(S) transport for production use
//! - [`MemoryTransport`](crate::MemoryTransport): in-memory transport for testing

use std::future::Future;
use std::pin::Pin;

use crate::error::ClientResult;
use crate::response::Response;
use crate::types::{Consistency, Precision};

/// A boxed, sendable future borrowed from the transport.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A query to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Query text, sent verbatim.
    pub query: String,
    /// Database context. Empty means none.
    pub database: String,
    /// Retention policy context. Empty means the default.
    pub retention_policy: String,
    /// Epoch precision of returned timestamps.
    pub epoch: Precision,
}

impl QueryRequest {
    /// Creates a request returning nanosecond timestamps.
    pub fn new(query: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            database: database.into(),
            retention_policy: String::new(),
            epoch: Precision::Nanosecond,
        }
    }

    /// Sets the retention policy context.
    pub fn retention_policy(mut self, rp: impl Into<String>) -> Self {
        self.retention_policy = rp.into();
        self
    }
}

/// A batch of write-protocol lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    /// Target database.
    pub database: String,
    /// Target retention policy. Empty means the default.
    pub retention_policy: String,
    /// Write consistency level.
    pub consistency: Consistency,
    /// Precision of the timestamps in `lines`.
    pub precision: Precision,
    /// Newline-free write-protocol lines.
    pub lines: Vec<String>,
}

impl WriteRequest {
    /// Creates a write for a database with default consistency and precision.
    pub fn new(database: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            database: database.into(),
            retention_policy: String::new(),
            consistency: Consistency::default(),
            precision: Precision::default(),
            lines,
        }
    }

    /// Sets the retention policy.
    pub fn retention_policy(mut self, rp: impl Into<String>) -> Self {
        self.retention_policy = rp.into();
        self
    }

    /// Sets the consistency level.
    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    /// Sets the timestamp precision.
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Number of points in the request.
    pub fn point_count(&self) -> usize {
        self.lines.len()
    }

    /// Encodes the lines as a request body.
    pub fn body(&self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }
}

/// Information returned by a ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server version, `unknown` if not reported.
    pub version: String,
}

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Checks that the server is reachable.
    fn ping(&self) -> BoxFuture<'_, ClientResult<ServerInfo>>;

    /// Executes a query.
    fn query<'a>(&'a self, request: &'a QueryRequest) -> BoxFuture<'a, ClientResult<Response>>;

    /// Submits a batch of points.
    fn write<'a>(&'a self, request: &'a WriteRequest) -> BoxFuture<'a, ClientResult<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_request_body() {
        let request = WriteRequest::new(
            "mydb",
            vec!["cpu value=1 1".to_string(), "cpu value=2 2".to_string()],
        )
        .retention_policy("autogen")
        .consistency(Consistency::One)
        .precision(Precision::Second);

        assert_eq!(request.point_count(), 2);
        assert_eq!(request.body(), "cpu value=1 1\ncpu value=2 2\n");
        assert_eq!(request.retention_policy, "autogen");
        assert_eq!(request.consistency, Consistency::One);
    }

    #[test]
    fn test_query_request_defaults() {
        let request = QueryRequest::new("SHOW DATABASES", "");
        assert_eq!(request.epoch, Precision::Nanosecond);
        assert!(request.database.is_empty());
    }
}
