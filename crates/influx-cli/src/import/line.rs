//! Write-protocol line validation.
//!
//! A line is `measurement[,tag=value...] field=value[,field=value...] [timestamp]`.
//! Commas, spaces and equals signs may be escaped with a backslash, and
//! string field values are double-quoted. The line is only checked, never
//! rewritten; the server receives it verbatim.

use thiserror::Error;

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// The line is blank.
    #[error("empty line")]
    Empty,
    /// The measurement name is missing.
    #[error("missing measurement")]
    MissingMeasurement,
    /// The field set is missing.
    #[error("missing fields")]
    MissingFields,
    /// A tag is not `key=value`.
    #[error("invalid tag '{0}'")]
    InvalidTag(String),
    /// A field is not `key=value` or has a malformed value.
    #[error("invalid field '{0}'")]
    InvalidField(String),
    /// The timestamp is not an integer.
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    /// Content after the timestamp.
    #[error("unexpected trailing data '{0}'")]
    TrailingData(String),
}

/// Checks that `line` is a well-formed write-protocol line.
pub fn validate(line: &str) -> Result<(), LineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(LineError::Empty);
    }

    // quotes only delimit string field values, never the measurement or tags
    let (key, rest) = split_once_unescaped(line, ' ').unwrap_or((line, ""));
    let (fields, rest) = split_field_set(rest);
    if let Some(rest) = rest {
        let mut parts = rest.split(' ');
        let timestamp = parts.next().unwrap_or_default();
        if timestamp.parse::<i64>().is_err() {
            return Err(LineError::InvalidTimestamp(timestamp.to_string()));
        }
        let trailing: Vec<&str> = parts.collect();
        if !trailing.is_empty() {
            return Err(LineError::TrailingData(trailing.join(" ")));
        }
    }

    validate_key(key)?;
    validate_fields(fields)
}

fn validate_key(key: &str) -> Result<(), LineError> {
    let parts = split_unescaped(key, ',');
    if parts[0].is_empty() {
        return Err(LineError::MissingMeasurement);
    }
    for tag in &parts[1..] {
        match split_unescaped(tag, '=').as_slice() {
            [k, v] if !k.is_empty() && !v.is_empty() => {}
            _ => return Err(LineError::InvalidTag(tag.to_string())),
        }
    }
    Ok(())
}

fn validate_fields(fields: &str) -> Result<(), LineError> {
    if fields.is_empty() {
        return Err(LineError::MissingFields);
    }
    for field in split_fields(fields) {
        let valid = match split_once_unescaped(field, '=') {
            Some((k, v)) => !k.is_empty() && is_field_value(v),
            None => false,
        };
        if !valid {
            return Err(LineError::InvalidField(field.to_string()));
        }
    }
    Ok(())
}

fn is_field_value(value: &str) -> bool {
    if let Some(content) = value.strip_prefix('"') {
        return closing_quote(content).map(|end| end + 1) == Some(content.len());
    }
    if matches!(
        value,
        "t" | "T" | "true" | "True" | "TRUE" | "f" | "F" | "false" | "False" | "FALSE"
    ) {
        return true;
    }
    if let Some(int) = value.strip_suffix('i') {
        return int.parse::<i64>().is_ok();
    }
    if let Some(uint) = value.strip_suffix('u') {
        return uint.parse::<u64>().is_ok();
    }
    // rejects inf and nan, which parse but are not storable
    value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Splits on `sep` outside backslash escapes.
fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&input[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Byte offset of the first unescaped `"` in `input`.
fn closing_quote(input: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Splits the field set off the rest of the line.
///
/// The field set ends at the first space outside escapes and outside a
/// quoted value. A quote opens a string only right after a field's `=`.
fn split_field_set(input: &str) -> (&str, Option<&str>) {
    let mut escaped = false;
    let mut in_value = false;
    let mut i = 0;

    while let Some(c) = input[i..].chars().next() {
        if escaped {
            escaped = false;
        } else {
            match c {
                '\\' => escaped = true,
                '"' if in_value && input[..i].ends_with('=') => {
                    // an unterminated string runs to the end of the line
                    match closing_quote(&input[i + 1..]) {
                        Some(end) => i += end + 1,
                        None => return (input, None),
                    }
                }
                '=' => in_value = true,
                ',' => in_value = false,
                ' ' => return (&input[..i], Some(&input[i + 1..])),
                _ => {}
            }
        }
        i += c.len_utf8();
    }
    (input, None)
}

/// Splits a field set into `key=value` pairs, keeping quoted commas.
fn split_fields(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut in_value = false;
    let mut i = 0;

    while let Some(c) = input[i..].chars().next() {
        if escaped {
            escaped = false;
        } else {
            match c {
                '\\' => escaped = true,
                '"' if in_value && input[..i].ends_with('=') => {
                    if let Some(end) = closing_quote(&input[i + 1..]) {
                        i += end + 1;
                    }
                }
                '=' => in_value = true,
                ',' => {
                    parts.push(&input[start..i]);
                    start = i + 1;
                    in_value = false;
                }
                _ => {}
            }
        }
        i += c.len_utf8();
    }
    parts.push(&input[start..]);
    parts
}

fn split_once_unescaped(input: &str, sep: char) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c == sep {
            return Some((&input[..i], &input[i + c.len_utf8()..]));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_lines() {
        let lines = [
            "cpu value=1",
            "cpu,host=server01,region=us-west value=0.64 1434055562000000000",
            "cpu value=1i,ok=true,msg=\"hello, world\" 1",
            "disk free=12u",
            r"my\ measurement,tag\ key=tag\,value field\=key=1e9",
            "weather temp=-3.5,note=\"say \\\"hi\\\" now\" -100",
            "cpu flag=F",
            r#"cpu,host=a"b value=1 1"#,
            r#"cp"u value=1 1"#,
            r#"cpu msg="a\\" 1"#,
            r#"cpu path="C:\\tmp\\",n=2i"#,
            r#"cpu msg="",n=1"#,
        ];
        for line in lines {
            assert_eq!(validate(line), Ok(()), "{line}");
        }
    }

    #[test]
    fn test_invalid_lines() {
        assert_eq!(validate("   "), Err(LineError::Empty));
        assert_eq!(validate("cpu"), Err(LineError::MissingFields));
        assert_eq!(validate(",host=a value=1"), Err(LineError::MissingMeasurement));
        assert!(matches!(validate("cpu,host value=1"), Err(LineError::InvalidTag(_))));
        assert!(matches!(validate("cpu,host= value=1"), Err(LineError::InvalidTag(_))));
        assert!(matches!(validate("cpu value"), Err(LineError::InvalidField(_))));
        assert!(matches!(validate("cpu value=abc"), Err(LineError::InvalidField(_))));
        assert!(matches!(validate("cpu value=1.5i"), Err(LineError::InvalidField(_))));
        assert!(matches!(validate("cpu value=\"open"), Err(LineError::InvalidField(_))));
        assert!(matches!(validate("cpu value=inf"), Err(LineError::InvalidField(_))));
        assert!(matches!(validate("cpu value=\""), Err(LineError::InvalidField(_))));
        assert!(matches!(validate(r#"cpu msg="a\" 1"#), Err(LineError::InvalidField(_))));
        assert!(matches!(validate(r#"cpu msg="a"b 1"#), Err(LineError::InvalidField(_))));
        assert!(matches!(
            validate("cpu value=1 yesterday"),
            Err(LineError::InvalidTimestamp(_))
        ));
        assert!(matches!(validate("cpu value=1 10 extra"), Err(LineError::TrailingData(_))));
        assert!(matches!(validate("cpu value=1  10"), Err(LineError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_split_unescaped() {
        assert_eq!(split_unescaped(r"a\,b,c", ','), vec![r"a\,b", "c"]);
        assert_eq!(split_unescaped(r#"a"b,c"#, ','), vec![r#"a"b"#, "c"]);
    }

    #[test]
    fn test_split_field_set() {
        assert_eq!(
            split_field_set(r#"f="x y",g=1 10"#),
            (r#"f="x y",g=1"#, Some("10"))
        );
        assert_eq!(split_field_set(r#"f="a\\" 10"#), (r#"f="a\\""#, Some("10")));
        assert_eq!(split_field_set("f=1"), ("f=1", None));
        assert_eq!(
            split_fields(r#"a=1,b="x,y",c\,d=2"#),
            vec!["a=1", r#"b="x,y""#, r#"c\,d=2"#]
        );
    }
}
