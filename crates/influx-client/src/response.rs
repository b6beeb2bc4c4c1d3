//! Query response model.
//!
//! Mirrors the JSON body returned by the `/query` endpoint:
//!
//! ```text
//! {"results": [{"statement_id": 0,
//!               "series": [{"name": "cpu", "tags": {...},
//!                           "columns": ["time", "value"],
//!                           "values": [[1500000000000000000, 0.64]]}]}]}
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// Integers and floats are kept apart so that re-encoding a value produces
/// the same JSON number type the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// Null value.
    Null,
}

impl Value {
    /// Returns true if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Tries to get as integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Tries to get as float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Tries to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => f.write_str(s),
            Value::Null => Ok(()),
        }
    }
}

/// One series of a statement result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Measurement name.
    #[serde(default)]
    pub name: String,
    /// Tag set, ordered by key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Column names.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Row tuples, one value per column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Vec<Value>>,
}

impl Series {
    /// Creates an empty series for a measurement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the column names.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Appends a row.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.values.push(values);
        self
    }

    /// Returns the index of the `time` column, if present.
    pub fn time_column(&self) -> Option<usize> {
        self.columns.iter().position(|c| c == "time")
    }
}

/// A server notice attached to a statement result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Severity, e.g. `warning`.
    pub level: String,
    /// Message text.
    pub text: String,
}

/// The result of one statement in a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    /// Position of the statement in the query string.
    #[serde(default)]
    pub statement_id: usize,
    /// Series returned by the statement.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub series: Vec<Series>,
    /// Server notices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    /// Statement-level error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatementResult {
    /// Creates a result holding the given series.
    pub fn with_series(statement_id: usize, series: Vec<Series>) -> Self {
        Self {
            statement_id,
            series,
            ..Self::default()
        }
    }
}

/// Response body of the `/query` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Per-statement results, in statement order.
    #[serde(default)]
    pub results: Vec<StatementResult>,
    /// Request-level error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Creates a response from statement results.
    pub fn new(results: Vec<StatementResult>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    /// Returns the first error in the response, request-level first.
    pub fn first_error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.results.iter().find_map(|r| r.error.as_deref()))
    }

    /// Total number of rows over all series.
    pub fn row_count(&self) -> usize {
        self.results
            .iter()
            .flat_map(|r| r.series.iter())
            .map(|s| s.values.len())
            .sum()
    }
}
