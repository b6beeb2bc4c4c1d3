//! In-memory transport for testing.
//!
//! Records every request it receives and answers from scripted queues,
//! which makes it possible to simulate transient server failures without a
//! running server.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::error::{ClientError, ClientResult};
use crate::response::Response;
use crate::transport::{BoxFuture, QueryRequest, ServerInfo, Transport, WriteRequest};

#[derive(Debug, Default)]
struct MemoryState {
    queries: Vec<QueryRequest>,
    writes: Vec<WriteRequest>,
    write_attempts: usize,
    responses: VecDeque<ClientResult<Response>>,
    write_results: VecDeque<ClientResult<()>>,
    ping_error: Option<String>,
}

/// A transport that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

impl MemoryTransport {
    /// Creates a new memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next query.
    ///
    /// Queries beyond the queued responses receive an empty response.
    pub fn push_response(&self, response: Response) {
        self.state.lock().responses.push_back(Ok(response));
    }

    /// Queues an error for the next query.
    pub fn push_query_error(&self, error: ClientError) {
        self.state.lock().responses.push_back(Err(error));
    }

    /// Queues an error for the next write attempt.
    ///
    /// Writes beyond the queued results succeed.
    pub fn push_write_error(&self, error: ClientError) {
        self.state.lock().write_results.push_back(Err(error));
    }

    /// Makes every subsequent ping fail.
    pub fn fail_ping(&self, message: impl Into<String>) {
        self.state.lock().ping_error = Some(message.into());
    }

    /// Returns the queries received so far.
    pub fn queries(&self) -> Vec<QueryRequest> {
        self.state.lock().queries.clone()
    }

    /// Returns the writes that succeeded so far.
    pub fn writes(&self) -> Vec<WriteRequest> {
        self.state.lock().writes.clone()
    }

    /// Returns the number of write attempts, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }

    /// Returns all successfully written lines in order.
    pub fn written_lines(&self) -> Vec<String> {
        self.state
            .lock()
            .writes
            .iter()
            .flat_map(|w| w.lines.iter().cloned())
            .collect()
    }
}

impl Transport for MemoryTransport {
    fn ping(&self) -> BoxFuture<'_, ClientResult<ServerInfo>> {
        let result = match &self.state.lock().ping_error {
            Some(message) => Err(ClientError::Network(message.clone())),
            None => Ok(ServerInfo {
                version: "memory".to_string(),
            }),
        };
        Box::pin(async move { result })
    }

    fn query<'a>(&'a self, request: &'a QueryRequest) -> BoxFuture<'a, ClientResult<Response>> {
        let result = {
            let mut state = self.state.lock();
            state.queries.push(request.clone());
            state
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(Response::default()))
        };
        Box::pin(async move { result })
    }

    fn write<'a>(&'a self, request: &'a WriteRequest) -> BoxFuture<'a, ClientResult<()>> {
        let result = {
            let mut state = self.state.lock();
            state.write_attempts += 1;
            let result = state.write_results.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                state.writes.push(request.clone());
            }
            result
        };
        Box::pin(async move { result })
    }
}
