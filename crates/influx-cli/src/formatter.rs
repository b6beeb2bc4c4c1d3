//! Output formatting for query results.
//!
//! Supports column, CSV and JSON output formats. Timestamps arrive from the
//! server as nanosecond epochs and are converted to the session precision
//! here.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat};
use comfy_table::{presets, ContentArrangement, Table};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use influx_client::{ParseEnumError, Precision, Response, Series, StatementResult, Value};

/// Indent used for pretty JSON.
const JSON_INDENT: &[u8] = b"    ";

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned text tables.
    #[default]
    Column,
    /// Comma-separated values.
    Csv,
    /// One JSON object per statement.
    Json,
}

impl OutputFormat {
    /// Returns the canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Column => "column",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "column" => Ok(OutputFormat::Column),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ParseEnumError {
                kind: "format",
                value: s.to_string(),
                expected: "json, csv, column",
            }),
        }
    }
}

/// Formats a query response according to the specified format.
pub fn render(
    response: &Response,
    format: OutputFormat,
    precision: Precision,
    pretty: bool,
) -> Result<String> {
    let response = convert_times(response, precision);
    match format {
        OutputFormat::Column => Ok(format_column(&response)),
        OutputFormat::Csv => Ok(format_csv(&response)),
        OutputFormat::Json => format_json(&response, pretty),
    }
}

/// Converts a nanosecond epoch to the given precision.
pub fn convert_timestamp(nanos: i64, precision: Precision) -> Value {
    match precision.nanos_per_unit() {
        Some(unit) => Value::Integer(nanos / unit),
        None => {
            let secs = nanos.div_euclid(1_000_000_000);
            let sub = nanos.rem_euclid(1_000_000_000) as u32;
            match DateTime::from_timestamp(secs, sub) {
                Some(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                None => Value::Integer(nanos),
            }
        }
    }
}

/// Returns a copy of the response with the `time` column converted.
fn convert_times(response: &Response, precision: Precision) -> Response {
    let mut response = response.clone();
    if precision == Precision::Nanosecond {
        return response;
    }

    for series in response.results.iter_mut().flat_map(|r| r.series.iter_mut()) {
        let Some(time_idx) = series.time_column() else {
            continue;
        };
        for row in series.values.iter_mut() {
            if let Some(cell) = row.get_mut(time_idx) {
                if let Value::Integer(nanos) = *cell {
                    *cell = convert_timestamp(nanos, precision);
                }
            }
        }
    }
    response
}

/// Formats the response as aligned text tables.
fn format_column(response: &Response) -> String {
    let mut blocks: Vec<String> = Vec::new();

    if let Some(error) = &response.error {
        blocks.push(format!("ERR: {}", error));
    }

    for result in &response.results {
        let mut lines: Vec<String> = result
            .messages
            .iter()
            .map(|m| format!("{}: {}", m.level, m.text))
            .collect();
        if let Some(error) = &result.error {
            lines.push(format!("ERR: {}", error));
        }
        if !lines.is_empty() {
            blocks.push(lines.join("\n"));
        }

        for series in &result.series {
            blocks.push(format_series_table(series));
        }
    }

    blocks.join("\n\n")
}

fn format_series_table(series: &Series) -> String {
    let mut output = String::new();
    if !series.name.is_empty() {
        output.push_str(&format!("name: {}\n", series.name));
    }
    if !series.tags.is_empty() {
        let tags: Vec<String> = series
            .tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        output.push_str(&format!("tags: {}\n", tags.join(", ")));
    }

    if series.values.is_empty() {
        return output.trim_end().to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Disabled);

    table.set_header(series.columns.iter());
    table.add_row(series.columns.iter().map(|c| "-".repeat(c.chars().count().max(1))));
    for row in &series.values {
        table.add_row(row.iter().map(|v| v.to_string()));
    }

    let rendered = table.to_string();
    let body: Vec<&str> = rendered.lines().map(str::trim_end).collect();
    output.push_str(&body.join("\n"));
    output
}

/// Formats the response as CSV, one header line per series.
fn format_csv(response: &Response) -> String {
    let mut output = String::new();

    if let Some(error) = &response.error {
        output.push_str(&format!("ERR: {}\n", error));
    }

    for result in &response.results {
        if let Some(error) = &result.error {
            output.push_str(&format!("ERR: {}\n", error));
        }

        for series in &result.series {
            let tag_keys: Vec<&String> = series.tags.keys().collect();

            let mut header = vec!["name".to_string()];
            header.extend(tag_keys.iter().map(|k| escape_csv(k)));
            header.extend(series.columns.iter().map(|c| escape_csv(c)));
            output.push_str(&header.join(","));
            output.push('\n');

            for row in &series.values {
                let mut values = vec![escape_csv(&series.name)];
                values.extend(series.tags.values().map(|v| escape_csv(v)));
                values.extend(row.iter().map(|v| escape_csv(&v.to_string())));
                output.push_str(&values.join(","));
                output.push('\n');
            }
        }
    }

    output.trim_end_matches('\n').to_string()
}

/// Escapes a value for CSV output.
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Formats the response as JSON, one object per statement.
fn format_json(response: &Response, pretty: bool) -> Result<String> {
    let mut objects = Vec::with_capacity(response.results.len() + 1);

    if let Some(error) = &response.error {
        let mut error_obj = serde_json::Map::new();
        error_obj.insert("error".to_string(), serde_json::Value::String(error.clone()));
        objects.push(encode_json(&error_obj, pretty)?);
    }
    for result in &response.results {
        objects.push(encode_json::<StatementResult>(result, pretty)?);
    }

    Ok(objects.join("\n"))
}

fn encode_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    if !pretty {
        return Ok(serde_json::to_string(value)?);
    }

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(JSON_INDENT));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}
