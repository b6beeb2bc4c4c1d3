//! Bulk import of exported data.
//!
//! The importer streams an export file, runs its DDL statements as queries
//! and sends its points in batches. Sending is throttled by a
//! points-per-second limit and transient write failures are retried.

pub mod clock;
pub mod limiter;
pub mod line;
pub mod retry;
pub mod source;

use std::fmt;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use influx_client::{ClientError, Consistency, Precision, QueryRequest, Transport, WriteRequest};

use crate::session::Session;

use self::clock::{Clock, SystemClock};
use self::limiter::RateLimiter;
use self::retry::RetryPolicy;
use self::source::{Entry, ExportReader};

/// Points per write request.
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Upper bound on a write request body.
pub const MAX_BATCH_BYTES: usize = 4 * 1024 * 1024;

/// Points between progress log lines.
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Fatal import errors.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The export file could not be opened.
    #[error("failed to open {}: {source}", path.display())]
    Open {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The export file is not valid gzip.
    #[error("failed to decompress {}: {source}", path.display())]
    Decompress {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// Reading failed part way through the file.
    #[error("read error at line {line}: {source}")]
    Read {
        /// Line being read.
        line: u64,
        /// Underlying error.
        source: io::Error,
        /// Progress up to the failed line.
        summary: Box<ImportSummary>,
    },

    /// The server could not be reached.
    #[error("connection failed: {0}")]
    Connection(#[source] ClientError),
}

impl ImportError {
    /// Progress made before the error, if any was.
    pub fn summary(&self) -> Option<&ImportSummary> {
        match self {
            ImportError::Read { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

/// What to import and how.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Export file.
    pub path: PathBuf,
    /// Whether the file is gzip-compressed.
    pub compressed: bool,
    /// Database used until the file sets a context.
    pub database: String,
    /// Retention policy used until the file sets a context.
    pub retention_policy: String,
    /// Write consistency.
    pub consistency: Consistency,
    /// Timestamp precision of the points.
    pub precision: Precision,
    /// Points per second, 0 for unlimited.
    pub pps: u32,
    /// Points per write request.
    pub batch_size: usize,
    /// Retry policy for each batch.
    pub retry: RetryPolicy,
}

impl ImportConfig {
    /// Creates a config with default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compressed: false,
            database: String::new(),
            retention_policy: String::new(),
            consistency: Consistency::default(),
            precision: Precision::default(),
            pps: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    /// Snapshots the session's write settings.
    ///
    /// A `.gz` extension implies `compressed`.
    pub fn from_session(session: &Session, path: impl Into<PathBuf>, compressed: bool) -> Self {
        let path = path.into();
        let compressed = compressed || has_gzip_extension(&path);
        Self {
            compressed,
            database: session.database.clone(),
            retention_policy: session.retention_policy.clone(),
            consistency: session.consistency,
            precision: session.precision,
            pps: session.pps,
            ..Self::new(path)
        }
    }

    /// Batch size after applying the points-per-second cap.
    pub fn effective_batch_size(&self) -> usize {
        let size = if self.pps > 0 {
            self.batch_size.min(self.pps as usize)
        } else {
            self.batch_size
        };
        size.max(1)
    }
}

fn has_gzip_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Import counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Physical lines read.
    pub lines_read: u64,
    /// Points accepted by the server.
    pub points_written: u64,
    /// Points in batches that failed.
    pub points_failed: u64,
    /// Points read but never sent because the run was cancelled.
    pub points_unsent: u64,
    /// Malformed lines.
    pub skipped_lines: u64,
    /// Successful write requests.
    pub batches_sent: u64,
    /// Failed write requests.
    pub batches_failed: u64,
    /// DDL statements executed.
    pub ddl_executed: u64,
    /// DDL statements that failed.
    pub ddl_failed: u64,
}

/// Result of an import run.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    /// Counters.
    pub stats: ImportStats,
    /// Wall time taken.
    pub elapsed: Duration,
    /// Whether the run was cancelled.
    pub interrupted: bool,
}

impl ImportSummary {
    /// Average write rate.
    pub fn points_per_second(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.stats.points_written as f64 / secs) as u64
        } else {
            self.stats.points_written
        }
    }

    /// True if every point was written and the run was not cancelled.
    pub fn is_success(&self) -> bool {
        !self.interrupted && self.stats.points_failed == 0 && self.stats.points_unsent == 0
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        if self.interrupted {
            writeln!(f, "Import interrupted")?;
        }
        writeln!(
            f,
            "Processed {} lines in {:.3}s",
            stats.lines_read,
            self.elapsed.as_secs_f64()
        )?;
        if stats.ddl_executed + stats.ddl_failed > 0 {
            writeln!(
                f,
                "DDL statements: {} executed, {} failed",
                stats.ddl_executed, stats.ddl_failed
            )?;
        }
        writeln!(
            f,
            "Points written: {} ({} per second)",
            stats.points_written,
            self.points_per_second()
        )?;
        writeln!(f, "Points failed: {}", stats.points_failed)?;
        if stats.points_unsent > 0 {
            writeln!(f, "Points not sent: {}", stats.points_unsent)?;
        }
        write!(f, "Lines skipped: {}", stats.skipped_lines)
    }
}

/// The run was cancelled.
struct Cancelled;

#[derive(Debug, Default)]
struct Batch {
    lines: Vec<String>,
    bytes: usize,
}

impl Batch {
    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push(line);
    }

    fn take(&mut self) -> Vec<String> {
        self.bytes = 0;
        mem::take(&mut self.lines)
    }
}

/// Runs one import job.
pub struct Importer {
    transport: Arc<dyn Transport>,
    config: ImportConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    limiter: RateLimiter,
    stats: ImportStats,
    database: String,
    retention_policy: String,
    batch: Batch,
}

impl Importer {
    /// Creates an importer on the system clock.
    pub fn new(transport: Arc<dyn Transport>, config: ImportConfig) -> Self {
        Self {
            transport,
            limiter: RateLimiter::new(config.pps),
            database: config.database.clone(),
            retention_policy: config.retention_policy.clone(),
            config,
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
            stats: ImportStats::default(),
            batch: Batch::default(),
        }
    }

    /// Replaces the time source.
    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stops the run when `cancel` is triggered.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Imports the whole file.
    ///
    /// Batch and DDL failures are counted in the summary; only failing to
    /// open, decompress or read the file, or to reach the server, is an
    /// error. Points read before a read error are still sent, and the error
    /// carries the summary.
    pub async fn run(mut self) -> Result<ImportSummary, ImportError> {
        let started = self.clock.now();
        let reader = source::open(&self.config.path, self.config.compressed)?;
        let mut entries = ExportReader::new(reader);

        self.transport
            .ping()
            .await
            .map_err(ImportError::Connection)?;

        info!(
            path = %self.config.path.display(),
            database = %self.database,
            pps = self.config.pps,
            "starting import"
        );

        let mut interrupted = false;
        let mut read_error = None;
        loop {
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            let entry = match entries.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    read_error = Some(e);
                    break;
                }
                None => break,
            };
            if self.process(entry).await.is_err() {
                interrupted = true;
                break;
            }
        }
        if !interrupted && self.flush().await.is_err() {
            interrupted = true;
        }
        self.stats.points_unsent += self.batch.take().len() as u64;

        self.stats.lines_read = entries.lines_read();
        let summary = ImportSummary {
            stats: self.stats,
            elapsed: self.clock.now().saturating_duration_since(started),
            interrupted,
        };

        if let Some(source) = read_error {
            warn!(stats = ?summary.stats, error = %source, "import aborted by read error");
            return Err(ImportError::Read {
                line: entries.lines_read() + 1,
                source,
                summary: Box::new(summary),
            });
        }

        info!(
            points_written = summary.stats.points_written,
            points_failed = summary.stats.points_failed,
            points_unsent = summary.stats.points_unsent,
            interrupted,
            "import finished"
        );
        Ok(summary)
    }

    async fn process(&mut self, entry: Entry) -> Result<(), Cancelled> {
        match entry {
            Entry::Section(section) => {
                self.flush().await?;
                debug!(?section, "entering section");
            }
            Entry::Database(database) => {
                self.flush().await?;
                debug!(%database, "switching database");
                self.database = database;
            }
            Entry::RetentionPolicy(rp) => {
                self.flush().await?;
                debug!(retention_policy = %rp, "switching retention policy");
                self.retention_policy = rp;
            }
            Entry::Statement(statement) => self.execute_ddl(statement).await?,
            Entry::Point(point) => {
                if let Err(e) = line::validate(&point) {
                    self.stats.skipped_lines += 1;
                    debug!(error = %e, line = %point, "skipping malformed line");
                    return Ok(());
                }
                if !self.batch.lines.is_empty()
                    && self.batch.bytes + point.len() + 1 > MAX_BATCH_BYTES
                {
                    self.flush().await?;
                }
                self.batch.push(point);
                if self.batch.lines.len() >= self.config.effective_batch_size() {
                    self.flush().await?;
                }
            }
        }
        Ok(())
    }

    async fn execute_ddl(&mut self, statement: String) -> Result<(), Cancelled> {
        let request = QueryRequest::new(statement, self.database.clone())
            .retention_policy(self.retention_policy.clone());

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Cancelled),
            result = self.transport.query(&request) => result,
        };
        let error = match result {
            Ok(response) => response.first_error().map(str::to_string),
            Err(e) => Some(e.to_string()),
        };
        match error {
            Some(error) => {
                self.stats.ddl_failed += 1;
                warn!(statement = %request.query, %error, "DDL statement failed");
            }
            None => {
                self.stats.ddl_executed += 1;
                debug!(statement = %request.query, "DDL statement executed");
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Cancelled> {
        if self.batch.lines.is_empty() {
            return Ok(());
        }
        let lines = self.batch.take();
        let points = lines.len() as u64;

        while let Some(wait) = self.limiter.acquire(points, self.clock.now()) {
            debug!(?wait, points, "throttling");
            let cancelled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => true,
                _ = self.clock.sleep(wait) => false,
            };
            if cancelled {
                return Err(self.abandon(points));
            }
        }

        let request = WriteRequest::new(self.database.clone(), lines)
            .retention_policy(self.retention_policy.clone())
            .consistency(self.config.consistency)
            .precision(self.config.precision);

        let transport = &self.transport;
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = retry::retry(&self.config.retry, &*self.clock, |_| transport.write(&request)) => Some(result),
        };
        let Some(result) = result else {
            return Err(self.abandon(points));
        };

        match result {
            Ok(()) => {
                let before = self.stats.points_written;
                self.stats.points_written += points;
                self.stats.batches_sent += 1;
                if before / PROGRESS_INTERVAL != self.stats.points_written / PROGRESS_INTERVAL {
                    info!(
                        points_written = self.stats.points_written,
                        points_failed = self.stats.points_failed,
                        "import progress"
                    );
                }
            }
            Err(e) => {
                self.stats.points_failed += points;
                self.stats.batches_failed += 1;
                warn!(
                    error = %e,
                    points,
                    database = %request.database,
                    "batch failed"
                );
            }
        }
        Ok(())
    }

    fn abandon(&mut self, points: u64) -> Cancelled {
        debug!(points, "batch abandoned");
        self.stats.points_unsent += points;
        Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::clock::ManualClock;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use influx_client::{BoxFuture, MemoryTransport, Response, StatementResult};
    use std::io::Write;
    use std::time::Instant;
    use tempfile::NamedTempFile;

    fn export_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn points(n: usize) -> String {
        (0..n)
            .map(|i| format!("cpu,host=h{} value={}i {}\n", i % 3, i, i))
            .collect()
    }

    async fn run(
        transport: &Arc<MemoryTransport>,
        clock: &Arc<ManualClock>,
        config: ImportConfig,
    ) -> Result<ImportSummary, ImportError> {
        Importer::new(transport.clone(), config)
            .with_clock(clock.clone())
            .run()
            .await
    }

    /// Trips `cancel` on the `nth` sleep.
    struct CancellingClock {
        inner: ManualClock,
        cancel: CancellationToken,
        nth: usize,
    }

    impl Clock for CancellingClock {
        fn now(&self) -> Instant {
            self.inner.now()
        }

        fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
            if self.inner.sleeps().len() + 1 >= self.nth {
                self.cancel.cancel();
            }
            self.inner.sleep(duration)
        }
    }

    fn config(file: &NamedTempFile) -> ImportConfig {
        ImportConfig {
            database: "telemetry".to_string(),
            ..ImportConfig::new(file.path())
        }
    }

    #[test]
    fn test_effective_batch_size() {
        let mut config = ImportConfig::new("export.txt");
        assert_eq!(config.effective_batch_size(), DEFAULT_BATCH_SIZE);
        config.pps = 100;
        assert_eq!(config.effective_batch_size(), 100);
        config.pps = 1_000_000;
        assert_eq!(config.effective_batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_from_session_detects_gzip() {
        let mut session = Session::default();
        session.database = "mydb".to_string();
        session.pps = 500;

        let config = ImportConfig::from_session(&session, "backup.txt.GZ", false);
        assert!(config.compressed);
        assert_eq!(config.database, "mydb");
        assert_eq!(config.pps, 500);

        assert!(!ImportConfig::from_session(&session, "backup.txt", false).compressed);
        assert!(ImportConfig::from_session(&session, "backup.txt", true).compressed);
    }

    #[tokio::test]
    async fn test_skips_malformed_lines() {
        let file = export_file("cpu value=1 1\nthis is not a point\ncpu value=2 2\ncpu value=oops 3\n");
        let transport = Arc::new(MemoryTransport::new());
        let clock = Arc::new(ManualClock::new());

        let summary = run(&transport, &clock, config(&file)).await.unwrap();

        assert_eq!(summary.stats.lines_read, 4);
        assert_eq!(summary.stats.skipped_lines, 2);
        assert_eq!(summary.stats.points_written, 2);
        assert!(summary.is_success());
        assert_eq!(transport.written_lines(), vec!["cpu value=1 1", "cpu value=2 2"]);
    }

    #[tokio::test]
    async fn test_ddl_and_context_switches() {
        let file = export_file(
            "# DDL\n\
             CREATE DATABASE db1\n\
             CREATE RETENTION POLICY weekly ON db1 DURATION 7d REPLICATION 1\n\
             # DML\n\
             # CONTEXT-DATABASE:db1\n\
             # CONTEXT-RETENTION-POLICY:weekly\n\
             cpu value=1 1\n\
             # CONTEXT-DATABASE:db2\n\
             mem free=2 2\n",
        );
        let transport = Arc::new(MemoryTransport::new());
        transport.push_response(Response::default());
        transport.push_response(Response::new(vec![StatementResult {
            error: Some("retention policy already exists".to_string()),
            ..StatementResult::default()
        }]));
        let clock = Arc::new(ManualClock::new());

        let summary = run(&transport, &clock, config(&file)).await.unwrap();

        let queries = transport.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].query, "CREATE DATABASE db1");
        assert_eq!(summary.stats.ddl_executed, 1);
        assert_eq!(summary.stats.ddl_failed, 1);

        let writes = transport.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].database, "db1");
        assert_eq!(writes[0].retention_policy, "weekly");
        assert_eq!(writes[0].lines, vec!["cpu value=1 1"]);
        assert_eq!(writes[1].database, "db2");
        assert_eq!(writes[1].retention_policy, "weekly");
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_gzip_import() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(points(10).as_bytes()).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();

        let transport = Arc::new(MemoryTransport::new());
        let clock = Arc::new(ManualClock::new());
        let mut config = config(&file);
        config.compressed = true;

        let summary = run(&transport, &clock, config).await.unwrap();
        assert_eq!(summary.stats.points_written, 10);
        assert_eq!(transport.written_lines().len(), 10);
    }

    #[tokio::test]
    async fn test_open_and_decompress_failures_send_nothing() {
        let transport = Arc::new(MemoryTransport::new());
        let clock = Arc::new(ManualClock::new());

        let missing = run(&transport, &clock, ImportConfig::new("/nonexistent/export.txt")).await;
        assert!(matches!(missing, Err(ImportError::Open { .. })));

        let file = export_file(&points(3));
        let mut config = config(&file);
        config.compressed = true;
        let result = run(&transport, &clock, config).await;
        assert!(matches!(result, Err(ImportError::Decompress { .. })));

        assert_eq!(transport.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let file = export_file(&points(3));
        let transport = Arc::new(MemoryTransport::new());
        transport.fail_ping("connection refused");
        let clock = Arc::new(ManualClock::new());

        let result = run(&transport, &clock, config(&file)).await;
        assert!(matches!(result, Err(ImportError::Connection(_))));
        assert_eq!(transport.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let file = export_file(&points(5));
        let transport = Arc::new(MemoryTransport::new());
        let policy = RetryPolicy::default();
        for _ in 1..policy.max_attempts {
            transport.push_write_error(ClientError::Server {
                status: 503,
                message: "overloaded".into(),
            });
        }
        let clock = Arc::new(ManualClock::new());

        let summary = run(&transport, &clock, config(&file)).await.unwrap();

        assert_eq!(summary.stats.points_written, 5);
        assert_eq!(summary.stats.points_failed, 0);
        assert_eq!(transport.write_attempts(), policy.max_attempts as usize);
        assert_eq!(clock.sleeps().len(), policy.max_attempts as usize - 1);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_import() {
        let file = export_file(&points(4));
        let transport = Arc::new(MemoryTransport::new());
        transport.push_write_error(ClientError::BadRequest("partial write".into()));
        let clock = Arc::new(ManualClock::new());
        let mut config = config(&file);
        config.batch_size = 2;

        let summary = run(&transport, &clock, config).await.unwrap();

        assert_eq!(summary.stats.points_failed, 2);
        assert_eq!(summary.stats.points_written, 2);
        assert_eq!(summary.stats.batches_failed, 1);
        assert_eq!(transport.write_attempts(), 2);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_points_per_second_limit() {
        let file = export_file(&points(50));
        let transport = Arc::new(MemoryTransport::new());
        let clock = Arc::new(ManualClock::new());
        let mut config = config(&file);
        config.pps = 10;

        let summary = run(&transport, &clock, config).await.unwrap();

        assert_eq!(summary.stats.points_written, 50);
        let writes = transport.writes();
        assert_eq!(writes.len(), 5);
        assert!(writes.iter().all(|w| w.point_count() <= 10));
        assert!(clock.elapsed() >= Duration::from_secs(4));
        assert!(summary.elapsed >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_unlimited_never_sleeps() {
        let file = export_file(&points(20));
        let transport = Arc::new(MemoryTransport::new());
        let clock = Arc::new(ManualClock::new());
        let mut config = config(&file);
        config.batch_size = 3;

        let summary = run(&transport, &clock, config).await.unwrap();

        assert_eq!(summary.stats.points_written, 20);
        assert_eq!(transport.writes().len(), 7);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_import_is_interrupted() {
        let file = export_file(&points(10));
        let transport = Arc::new(MemoryTransport::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = Importer::new(transport.clone(), config(&file))
            .with_clock(Arc::new(ManualClock::new()))
            .with_cancellation(cancel)
            .run()
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert!(!summary.is_success());
        assert_eq!(transport.write_attempts(), 0);
        assert!(summary.to_string().starts_with("Import interrupted"));
    }

    #[tokio::test]
    async fn test_quotes_outside_string_fields_are_literal() {
        let file = export_file(concat!(
            "cpu,host=a\"b value=1 1\n",
            "c\"pu value=2 2\n",
            "cpu msg=\"a\\\\\" 3\n",
            "cpu msg=\"unterminated 4\n",
        ));
        let transport = Arc::new(MemoryTransport::new());
        let clock = Arc::new(ManualClock::new());

        let summary = run(&transport, &clock, config(&file)).await.unwrap();

        assert_eq!(summary.stats.points_written, 3);
        assert_eq!(summary.stats.skipped_lines, 1);
        assert_eq!(
            transport.written_lines(),
            vec!["cpu,host=a\"b value=1 1", "c\"pu value=2 2", "cpu msg=\"a\\\\\" 3"]
        );
    }

    #[tokio::test]
    async fn test_cancel_while_throttled_keeps_progress() {
        let file = export_file(&points(50));
        let transport = Arc::new(MemoryTransport::new());
        let cancel = CancellationToken::new();
        let clock = Arc::new(CancellingClock {
            inner: ManualClock::new(),
            cancel: cancel.clone(),
            nth: 2,
        });
        let mut config = config(&file);
        config.pps = 10;

        let summary = Importer::new(transport.clone(), config)
            .with_clock(clock)
            .with_cancellation(cancel)
            .run()
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.stats.points_written, 20);
        assert_eq!(summary.stats.points_unsent, 10);
        assert_eq!(summary.stats.lines_read, 30);
        assert_eq!(transport.writes().len(), 2);
        assert!(!summary.is_success());
        assert!(summary.to_string().contains("Points not sent: 10"));
    }

    #[tokio::test]
    async fn test_read_error_keeps_progress() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(points(7).as_bytes()).unwrap();
        let mut compressed = encoder.finish().unwrap();
        // drop the length field of the gzip trailer
        compressed.truncate(compressed.len() - 4);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&compressed).unwrap();

        let transport = Arc::new(MemoryTransport::new());
        let clock = Arc::new(ManualClock::new());
        let mut config = config(&file);
        config.compressed = true;
        config.batch_size = 5;

        let err = run(&transport, &clock, config).await.unwrap_err();

        assert!(matches!(err, ImportError::Read { line: 8, .. }));
        let summary = err.summary().unwrap();
        assert_eq!(summary.stats.lines_read, 7);
        assert_eq!(summary.stats.points_written, 7);
        assert_eq!(summary.stats.points_unsent, 0);
        assert_eq!(transport.writes().len(), 2);
    }
}
