//! # influx-client
//!
//! Client library for the InfluxDB 1.x HTTP API.
//!
//! This crate provides:
//!
//! - **HTTP Client**: `/ping`, `/query` and `/write` over http or https
//! - **Transport Trait**: the seam used by the shell and the importer
//! - **Memory Transport**: scripted in-memory transport for tests
//! - **Response Model**: statement results, series and typed values
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use influx_client::{Client, ClientConfig, QueryRequest, WriteRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientConfig::new().host("localhost").port(8086))?;
//!     println!("server version {}", client.ping().await?.version);
//!
//!     let response = client.query(&QueryRequest::new("SELECT * FROM cpu", "metrics")).await?;
//!     println!("{} rows", response.row_count());
//!
//!     client
//!         .write(&WriteRequest::new("metrics", vec!["cpu value=0.64".to_string()]))
//!         .await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types.
pub mod error;

/// HTTP client.
pub mod client;

/// In-memory transport.
pub mod memory;

/// Query response model.
pub mod response;

/// Transport trait and request types.
pub mod transport;

/// Enumerated request parameters.
pub mod types;

// Re-exports
pub use client::{Client, ClientConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ClientError, ClientResult};
pub use memory::MemoryTransport;
pub use response::{Message, Response, Series, StatementResult, Value};
pub use transport::{BoxFuture, QueryRequest, ServerInfo, Transport, WriteRequest};
pub use types::{Consistency, ParseEnumError, Precision};
