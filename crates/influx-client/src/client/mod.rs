//! HTTP client.
//!
//! Provides the `Client` struct that talks to the `/ping`, `/query` and
//! `/write` endpoints.

use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::response::Response;
use crate::transport::{BoxFuture, QueryRequest, ServerInfo, Transport, WriteRequest};

/// Default server port.
pub const DEFAULT_PORT: u16 = 8086;

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Header carrying the server version.
const VERSION_HEADER: &str = "X-Influxdb-Version";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username for basic authentication.
    pub username: Option<String>,
    /// Password for basic authentication.
    pub password: Option<String>,
    /// Whether to use https.
    pub use_ssl: bool,
    /// Skip certificate verification.
    pub unsafe_ssl: bool,
    /// Request timeout. Zero disables it.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            use_ssl: false,
            unsafe_ssl: false,
            timeout: Duration::ZERO,
            user_agent: concat!("influx-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a new client configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enables https.
    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Disables certificate verification.
    pub fn unsafe_ssl(mut self, unsafe_ssl: bool) -> Self {
        self.unsafe_ssl = unsafe_ssl;
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the base URL, e.g. `http://localhost:8086`.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

/// Error body returned by the server.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for a single server.
#[derive(Debug, Clone)]
pub struct Client {
    /// Configuration.
    config: ClientConfig,
    /// Base URL derived from the configuration.
    base_url: String,
    /// Underlying HTTP client.
    http: reqwest::Client,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        if config.host.trim().is_empty() {
            return Err(ClientError::InvalidConfig("host must not be empty".to_string()));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.unsafe_ssl);
        if !config.timeout.is_zero() {
            builder = builder.timeout(config.timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            base_url: config.base_url(),
            config,
            http,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_ref()),
            None => request,
        }
    }

    /// Pings the server.
    pub async fn ping(&self) -> ClientResult<ServerInfo> {
        let url = format!("{}/ping", self.base_url);
        let response = self.authenticate(self.http.get(&url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let version = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        Ok(ServerInfo { version })
    }

    /// Executes a query.
    pub async fn query(&self, request: &QueryRequest) -> ClientResult<Response> {
        let url = format!("{}/query", self.base_url);
        let mut form = vec![
            ("q", request.query.as_str()),
            ("epoch", request.epoch.write_param()),
        ];
        if !request.database.is_empty() {
            form.push(("db", request.database.as_str()));
        }
        if !request.retention_policy.is_empty() {
            form.push(("rp", request.retention_policy.as_str()));
        }

        debug!(db = %request.database, "executing query");
        let response = self
            .authenticate(self.http.post(&url))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }
        Err(status_error(status, &body))
    }

    /// Writes a batch of points.
    pub async fn write(&self, request: &WriteRequest) -> ClientResult<()> {
        let url = format!("{}/write", self.base_url);
        let mut params = vec![
            ("db", request.database.as_str()),
            ("consistency", request.consistency.as_str()),
            ("precision", request.precision.write_param()),
        ];
        if !request.retention_policy.is_empty() {
            params.push(("rp", request.retention_policy.as_str()));
        }

        debug!(
            db = %request.database,
            points = request.point_count(),
            "writing batch"
        );
        let response = self
            .authenticate(self.http.post(&url))
            .query(&params)
            .body(request.body())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

impl Transport for Client {
    fn ping(&self) -> BoxFuture<'_, ClientResult<ServerInfo>> {
        Box::pin(Client::ping(self))
    }

    fn query<'a>(&'a self, request: &'a QueryRequest) -> BoxFuture<'a, ClientResult<Response>> {
        Box::pin(Client::query(self, request))
    }

    fn write<'a>(&'a self, request: &'a WriteRequest) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(Client::write(self, request))
    }
}

/// Maps a non-success status and its body to an error.
fn status_error(status: StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or("no message").to_string()
    } else {
        message
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Authentication(message),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => ClientError::BadRequest(message),
        StatusCode::NOT_FOUND => ClientError::Query(message),
        s => ClientError::Server {
            status: s.as_u16(),
            message,
        },
    }
}
