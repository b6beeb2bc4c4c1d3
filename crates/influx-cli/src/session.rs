//! Session state shared by the command loop and the importer.
//!
//! The session is created once from the merged configuration and mutated in
//! place by meta-commands. Every setter validates before it mutates, so a
//! rejected value leaves the previous one in effect.

use std::fmt;

use comfy_table::{presets, Table};
use thiserror::Error;

use influx_client::{ClientConfig, Consistency, ParseEnumError, Precision};

use crate::config::CliConfig;
use crate::formatter::OutputFormat;

/// Errors raised when a setting is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The value is not valid for the setting.
    #[error("invalid {field} '{value}': {reason}")]
    InvalidValue {
        /// Setting name.
        field: String,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No such setting.
    #[error("unknown setting '{0}'")]
    UnknownField(String),
}

impl SessionError {
    fn invalid(field: &str, value: &str, reason: impl Into<String>) -> Self {
        SessionError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<ParseEnumError> for SessionError {
    fn from(e: ParseEnumError) -> Self {
        SessionError::InvalidValue {
            field: e.kind.to_string(),
            value: e.value,
            reason: format!("expected one of: {}", e.expected),
        }
    }
}

/// Connection parameters and display/write preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username for authentication.
    pub username: Option<String>,
    /// Password for authentication.
    pub password: Option<String>,
    /// Current database, empty when none is selected.
    pub database: String,
    /// Current retention policy, empty for the database default.
    pub retention_policy: String,
    /// Connect over https.
    pub ssl: bool,
    /// Skip certificate verification.
    pub unsafe_ssl: bool,
    /// Output format for query results.
    pub format: OutputFormat,
    /// Timestamp precision for rendering and writes.
    pub precision: Precision,
    /// Write consistency.
    pub consistency: Consistency,
    /// Pretty-print JSON output.
    pub pretty: bool,
    /// Import throttle in points per second, 0 for unlimited.
    pub pps: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            host: influx_client::DEFAULT_HOST.to_string(),
            port: influx_client::DEFAULT_PORT,
            username: None,
            password: None,
            database: String::new(),
            retention_policy: String::new(),
            ssl: false,
            unsafe_ssl: false,
            format: OutputFormat::Column,
            precision: Precision::Nanosecond,
            consistency: Consistency::All,
            pretty: false,
            pps: 0,
        }
    }
}

impl Session {
    /// Builds a session from configuration, validating every setting.
    pub fn from_config(config: &CliConfig) -> Result<Self, SessionError> {
        let mut session = Session::default();
        session.set_field("host", &config.host)?;
        session.set_field("port", &config.port.to_string())?;
        session.username = config.username.clone();
        session.password = config.password.clone();
        if let Some(db) = &config.database {
            session.set_field("database", db)?;
        }
        if let Some(rp) = &config.retention_policy {
            session.set_field("retention_policy", rp)?;
        }
        session.ssl = config.ssl;
        session.unsafe_ssl = config.unsafe_ssl;
        session.set_field("format", &config.format)?;
        session.set_field("precision", &config.precision)?;
        session.set_field("consistency", &config.consistency)?;
        session.pretty = config.pretty;
        session.pps = config.pps;
        Ok(session)
    }

    /// Sets a field by name.
    ///
    /// The value is parsed before anything is changed; on error the
    /// session is left untouched.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        let value = value.trim();
        match name.to_lowercase().as_str() {
            "host" => {
                if value.is_empty() {
                    return Err(SessionError::invalid("host", value, "host must not be empty"));
                }
                self.host = value.to_string();
            }
            "port" => self.port = parse_port(value)?,
            "username" | "user" => self.username = non_empty(value),
            "password" => self.password = non_empty(value),
            "database" | "db" => self.database = value.to_string(),
            "retention_policy" | "rp" => self.retention_policy = value.to_string(),
            "ssl" => self.ssl = parse_bool("ssl", value)?,
            "unsafe_ssl" | "unsafessl" => self.unsafe_ssl = parse_bool("unsafe_ssl", value)?,
            "pretty" => self.pretty = parse_bool("pretty", value)?,
            "format" => self.format = value.parse()?,
            "precision" => self.precision = value.parse()?,
            "consistency" => self.consistency = value.parse()?,
            "pps" => {
                self.pps = value.parse().map_err(|_| {
                    SessionError::invalid("pps", value, "expected a non-negative integer")
                })?
            }
            other => return Err(SessionError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Selects a database, optionally qualified with a retention policy as
    /// `db.rp`. Identifiers may be double-quoted.
    pub fn use_database(&mut self, target: &str) -> Result<(), SessionError> {
        let parts = split_identifiers(target.trim());
        match parts.as_slice() {
            [db] if !db.is_empty() => {
                self.database = db.clone();
                self.retention_policy.clear();
                Ok(())
            }
            [db, rp] if !db.is_empty() && !rp.is_empty() => {
                self.database = db.clone();
                self.retention_policy = rp.clone();
                Ok(())
            }
            _ => Err(SessionError::invalid(
                "database",
                target,
                "expected <database> or <database>.<retention policy>",
            )),
        }
    }

    /// Changes the connection target from `host`, `host:port` or `[v6]:port`.
    ///
    /// A missing port keeps the current one.
    pub fn set_target(&mut self, target: &str) -> Result<(), SessionError> {
        let target = target.trim();
        let (host, port) = split_target(target)?;

        let port = match port {
            Some(p) => parse_port(p)?,
            None => self.port,
        };
        if !host.is_empty() {
            self.host = host.to_string();
        }
        self.port = port;
        Ok(())
    }

    /// Returns `host:port` of the current target.
    pub fn target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Snapshot of the connection settings for the next request.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new()
            .host(self.host.clone())
            .port(self.port)
            .use_ssl(self.ssl)
            .unsafe_ssl(self.unsafe_ssl)
            .user_agent(concat!("influx-cli/", env!("CARGO_PKG_VERSION")));
        config.username = self.username.clone();
        config.password = self.password.clone();
        config
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut table = Table::new();
        table.load_preset(presets::NOTHING);
        table.set_header(vec!["Setting", "Value"]);
        table.add_row(vec!["Host".to_string(), self.target()]);
        table.add_row(vec![
            "Username".to_string(),
            self.username.clone().unwrap_or_default(),
        ]);
        table.add_row(vec!["Database".to_string(), self.database.clone()]);
        table.add_row(vec![
            "RetentionPolicy".to_string(),
            self.retention_policy.clone(),
        ]);
        table.add_row(vec!["SSL".to_string(), self.ssl.to_string()]);
        table.add_row(vec!["UnsafeSSL".to_string(), self.unsafe_ssl.to_string()]);
        table.add_row(vec!["Pretty".to_string(), self.pretty.to_string()]);
        table.add_row(vec!["Format".to_string(), self.format.to_string()]);
        table.add_row(vec!["Precision".to_string(), self.precision.to_string()]);
        table.add_row(vec!["WriteConsistency".to_string(), self.consistency.to_string()]);
        table.add_row(vec!["PointsPerSecond".to_string(), self.pps.to_string()]);
        write!(f, "{}", table)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_port(value: &str) -> Result<u16, SessionError> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(SessionError::invalid(
            "port",
            value,
            "expected a number between 1 and 65535",
        )),
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, SessionError> {
    match value.to_lowercase().as_str() {
        "true" | "t" | "1" | "on" | "yes" => Ok(true),
        "false" | "f" | "0" | "off" | "no" => Ok(false),
        _ => Err(SessionError::invalid(field, value, "expected true or false")),
    }
}

/// Splits `host:port` into its parts.
fn split_target(target: &str) -> Result<(&str, Option<&str>), SessionError> {
    if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| SessionError::invalid("host", target, "unterminated '['"))?;
        return match tail {
            "" => Ok((host, None)),
            t => match t.strip_prefix(':') {
                Some(port) => Ok((host, Some(port))),
                None => Err(SessionError::invalid("host", target, "expected ':' after ']'")),
            },
        };
    }

    match target.matches(':').count() {
        0 => Ok((target, None)),
        1 => {
            let (host, port) = target.split_once(':').unwrap_or((target, ""));
            Ok((host, Some(port)))
        }
        // bare IPv6 address
        _ => Ok((target, None)),
    }
}

/// Splits a dotted identifier, honouring double quotes.
fn split_identifiers(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}
