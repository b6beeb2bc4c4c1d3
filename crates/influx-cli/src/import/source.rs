//! Export file reading.
//!
//! An export file is plain text, optionally gzip-compressed. Lines starting
//! with `#` are directives or comments:
//!
//! ```text
//! # DDL
//! CREATE DATABASE telemetry
//! # DML
//! # CONTEXT-DATABASE:telemetry
//! # CONTEXT-RETENTION-POLICY:autogen
//! cpu,host=a value=1 1500000000000000000
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use super::ImportError;

const DATABASE_DIRECTIVE: &str = "# CONTEXT-DATABASE:";
const RETENTION_POLICY_DIRECTIVE: &str = "# CONTEXT-RETENTION-POLICY:";

/// Opens an export file, decompressing it if `compressed`.
///
/// For compressed input the gzip header is read here, so a file that is
/// not gzip fails before anything is sent.
pub fn open(path: &Path, compressed: bool) -> Result<Box<dyn BufRead + Send>, ImportError> {
    let file = File::open(path).map_err(|source| ImportError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    if !compressed {
        return Ok(Box::new(BufReader::new(file)));
    }

    let mut reader = BufReader::new(GzDecoder::new(BufReader::new(file)));
    reader.fill_buf().map_err(|source| ImportError::Decompress {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(reader))
}

/// File section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Schema statements run as queries.
    Ddl,
    /// Write-protocol points.
    Dml,
}

/// One meaningful line of an export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A `# DDL` or `# DML` marker.
    Section(Section),
    /// `# CONTEXT-DATABASE:<name>`.
    Database(String),
    /// `# CONTEXT-RETENTION-POLICY:<name>`.
    RetentionPolicy(String),
    /// A line inside a DDL section.
    Statement(String),
    /// A write-protocol line.
    Point(String),
}

/// Classifies the lines of an export file.
///
/// Blank lines and comments are skipped. Invalid UTF-8 is replaced rather
/// than treated as a read error; the line then fails validation.
pub struct ExportReader<R> {
    reader: R,
    buf: Vec<u8>,
    section: Option<Section>,
    lines_read: u64,
}

impl<R: BufRead> ExportReader<R> {
    /// Wraps a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(1024),
            section: None,
            lines_read: 0,
        }
    }

    /// Physical lines consumed so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    fn classify(&mut self, line: &str) -> Option<Entry> {
        if line.is_empty() {
            return None;
        }
        if line.starts_with('#') {
            return self.directive(line);
        }
        match self.section {
            Some(Section::Ddl) => Some(Entry::Statement(line.to_string())),
            _ => Some(Entry::Point(line.to_string())),
        }
    }

    fn directive(&mut self, line: &str) -> Option<Entry> {
        if let Some(db) = line.strip_prefix(DATABASE_DIRECTIVE) {
            return Some(Entry::Database(db.trim().to_string()));
        }
        if let Some(rp) = line.strip_prefix(RETENTION_POLICY_DIRECTIVE) {
            return Some(Entry::RetentionPolicy(rp.trim().to_string()));
        }
        let section = match line.trim_start_matches('#').trim() {
            "DDL" => Section::Ddl,
            "DML" => Section::Dml,
            _ => return None,
        };
        self.section = Some(section);
        Some(Entry::Section(section))
    }
}

impl<R: BufRead> Iterator for ExportReader<R> {
    type Item = io::Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }
            self.lines_read += 1;

            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim().to_string();
            if let Some(entry) = self.classify(&line) {
                return Some(Ok(entry));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn entries(input: &str) -> Vec<Entry> {
        ExportReader::new(Cursor::new(input.as_bytes().to_vec()))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_classifies_sections_and_context() {
        let input = "\
# INFLUXDB EXPORT: 1677-09-21T00:12:43Z - 2262-04-11T23:47:16Z
# DDL
CREATE DATABASE telemetry WITH NAME autogen

# DML
# CONTEXT-DATABASE:telemetry
# CONTEXT-RETENTION-POLICY:autogen
# writing tsm data
cpu value=1 1
";
        assert_eq!(
            entries(input),
            vec![
                Entry::Section(Section::Ddl),
                Entry::Statement("CREATE DATABASE telemetry WITH NAME autogen".into()),
                Entry::Section(Section::Dml),
                Entry::Database("telemetry".into()),
                Entry::RetentionPolicy("autogen".into()),
                Entry::Point("cpu value=1 1".into()),
            ]
        );
    }

    #[test]
    fn test_lines_without_section_are_points() {
        let mut reader = ExportReader::new(Cursor::new(b"cpu value=1\r\n\nmem free=2\n".to_vec()));
        assert_eq!(reader.next().unwrap().unwrap(), Entry::Point("cpu value=1".into()));
        assert_eq!(reader.next().unwrap().unwrap(), Entry::Point("mem free=2".into()));
        assert!(reader.next().is_none());
        assert_eq!(reader.lines_read(), 3);
    }

    #[test]
    fn test_open_plain_and_gzip() {
        let mut plain = NamedTempFile::new().unwrap();
        writeln!(plain, "cpu value=1").unwrap();
        let mut reader = open(plain.path(), false).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "cpu value=1\n");

        let mut gz = NamedTempFile::new().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"mem free=2\n").unwrap();
        gz.write_all(&encoder.finish().unwrap()).unwrap();
        let mut reader = open(gz.path(), true).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "mem free=2\n");
    }

    #[test]
    fn test_open_errors() {
        let missing = open(Path::new("/nonexistent/export.txt"), false);
        assert!(matches!(missing, Err(ImportError::Open { .. })));

        let mut not_gzip = NamedTempFile::new().unwrap();
        writeln!(not_gzip, "cpu value=1").unwrap();
        let result = open(not_gzip.path(), true);
        assert!(matches!(result, Err(ImportError::Decompress { .. })));
    }
}
