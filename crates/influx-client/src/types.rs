//! Enumerated request parameters.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A value that is not one of an enumeration's accepted spellings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}', expected one of: {expected}")]
pub struct ParseEnumError {
    /// Name of the enumeration.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Accepted spellings, comma separated.
    pub expected: &'static str,
}

/// Timestamp precision.
///
/// Used both for rendering query results and as the `precision` parameter of
/// writes. `Rfc3339` is a rendering format only; writes fall back to
/// nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// RFC 3339 UTC string.
    Rfc3339,
    /// Hours.
    Hour,
    /// Minutes.
    Minute,
    /// Seconds.
    Second,
    /// Milliseconds.
    Millisecond,
    /// Microseconds.
    Microsecond,
    /// Nanoseconds.
    #[default]
    Nanosecond,
}

impl Precision {
    const EXPECTED: &'static str = "rfc3339, h, m, s, ms, u, ns";

    /// Returns the canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Rfc3339 => "rfc3339",
            Precision::Hour => "h",
            Precision::Minute => "m",
            Precision::Second => "s",
            Precision::Millisecond => "ms",
            Precision::Microsecond => "u",
            Precision::Nanosecond => "ns",
        }
    }

    /// Number of nanoseconds in one unit, `None` for `Rfc3339`.
    pub fn nanos_per_unit(&self) -> Option<i64> {
        match self {
            Precision::Rfc3339 => None,
            Precision::Hour => Some(3_600_000_000_000),
            Precision::Minute => Some(60_000_000_000),
            Precision::Second => Some(1_000_000_000),
            Precision::Millisecond => Some(1_000_000),
            Precision::Microsecond => Some(1_000),
            Precision::Nanosecond => Some(1),
        }
    }

    /// The value sent as the write `precision` query parameter.
    pub fn write_param(&self) -> &'static str {
        match self {
            Precision::Rfc3339 => Precision::Nanosecond.as_str(),
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rfc3339" => Ok(Precision::Rfc3339),
            "h" => Ok(Precision::Hour),
            "m" => Ok(Precision::Minute),
            "s" => Ok(Precision::Second),
            "ms" => Ok(Precision::Millisecond),
            "u" => Ok(Precision::Microsecond),
            "ns" => Ok(Precision::Nanosecond),
            _ => Err(ParseEnumError {
                kind: "precision",
                value: s.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

/// Write consistency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Acknowledge once any node has the write, including hinted handoff.
    Any,
    /// Acknowledge once one data node has the write.
    One,
    /// Acknowledge once a quorum of nodes has the write.
    Quorum,
    /// Acknowledge once all nodes have the write.
    #[default]
    All,
}

impl Consistency {
    const EXPECTED: &'static str = "any, one, quorum, all";

    /// Returns the canonical spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Any => "any",
            Consistency::One => "one",
            Consistency::Quorum => "quorum",
            Consistency::All => "all",
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Consistency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "any" => Ok(Consistency::Any),
            "one" => Ok(Consistency::One),
            "quorum" => Ok(Consistency::Quorum),
            "all" => Ok(Consistency::All),
            _ => Err(ParseEnumError {
                kind: "consistency",
                value: s.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precision() {
        assert_eq!("ms".parse::<Precision>(), Ok(Precision::Millisecond));
        assert_eq!("RFC3339".parse::<Precision>(), Ok(Precision::Rfc3339));
        assert_eq!("u".parse::<Precision>(), Ok(Precision::Microsecond));

        let err = "fortnight".parse::<Precision>().unwrap_err();
        assert_eq!(err.value, "fortnight");
        assert!(err.to_string().contains("rfc3339"));
    }

    #[test]
    fn test_precision_units() {
        assert_eq!(Precision::Nanosecond.nanos_per_unit(), Some(1));
        assert_eq!(Precision::Second.nanos_per_unit(), Some(1_000_000_000));
        assert_eq!(Precision::Rfc3339.nanos_per_unit(), None);
        assert_eq!(Precision::Rfc3339.write_param(), "ns");
        assert_eq!(Precision::Millisecond.write_param(), "ms");
    }

    #[test]
    fn test_parse_consistency() {
        assert_eq!("quorum".parse::<Consistency>(), Ok(Consistency::Quorum));
        assert_eq!("ANY".parse::<Consistency>(), Ok(Consistency::Any));
        assert!("most".parse::<Consistency>().is_err());
        assert_eq!(Consistency::default(), Consistency::All);
    }
}
