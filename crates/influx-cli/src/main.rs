//! InfluxDB command-line shell.
//!
//! # Usage
//!
//! ```bash
//! # Start the interactive shell
//! influx -H localhost -p 8086
//!
//! # Execute a single query
//! influx -d telemetry -e "SELECT * FROM cpu LIMIT 10" --format csv
//!
//! # Import an export file, at most 10k points per second
//! influx --import --path export.txt.gz --compressed --pps 10000
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod formatter;
mod import;
mod repl;
mod session;

use config::CliConfig;
use repl::{http_connector, spawn_interrupt_watcher, Repl, Shell};
use session::Session;

/// InfluxDB shell
#[derive(Parser, Debug)]
#[command(
    name = "influx",
    version,
    disable_version_flag = true,
    about = "Command-line shell for InfluxDB",
    long_about = "An interactive shell for querying InfluxDB.\n\n\
                  Run a single query with --execute, or bulk-load an export file\n\
                  with --import --path <file>."
)]
struct Args {
    /// Server hostname
    #[arg(short = 'H', long, env = "INFLUX_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(short = 'p', long, env = "INFLUX_PORT")]
    port: Option<u16>,

    /// Username
    #[arg(short = 'u', long, env = "INFLUX_USERNAME")]
    username: Option<String>,

    /// Password (use INFLUX_PASSWORD env var for security)
    #[arg(long, env = "INFLUX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Database to use
    #[arg(short = 'd', long)]
    database: Option<String>,

    /// Retention policy to use
    #[arg(long = "rp")]
    retention_policy: Option<String>,

    /// Connect over HTTPS
    #[arg(long)]
    ssl: bool,

    /// Skip TLS certificate verification
    #[arg(long, alias = "unsafeSsl")]
    unsafe_ssl: bool,

    /// Output format: column, csv or json
    #[arg(long)]
    format: Option<String>,

    /// Timestamp precision: rfc3339, h, m, s, ms, u or ns
    #[arg(long)]
    precision: Option<String>,

    /// Write consistency: any, one, quorum or all
    #[arg(long)]
    consistency: Option<String>,

    /// Pretty print json output
    #[arg(long)]
    pretty: bool,

    /// Execute a query and exit
    #[arg(short = 'e', long, value_name = "QUERY")]
    execute: Option<String>,

    /// Import an export file and exit
    #[arg(long, requires = "path")]
    import: bool,

    /// Export file to import
    #[arg(long, value_name = "FILE")]
    path: Option<PathBuf>,

    /// The export file is gzip-compressed
    #[arg(long)]
    compressed: bool,

    /// Points per second for imports, 0 for unlimited
    #[arg(long)]
    pps: Option<u32>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,

    /// Display the shell version and exit
    #[arg(short = 'v', long)]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    if args.version {
        println!("InfluxDB shell version: {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging(args.verbose);

    let config = load_config(&args)?;
    let session = Session::from_config(&config).context("invalid configuration")?;
    let mut shell = Shell::new(session, http_connector());

    if args.import {
        let path = args.path.as_deref().context("--import requires --path")?;
        run_import(&mut shell, &path.to_string_lossy(), args.compressed).await
    } else if let Some(query) = &args.execute {
        execute(&mut shell, query).await
    } else {
        run_repl(shell, &config).await
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("influx=debug,influx_client=debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<CliConfig> {
    let mut config = if let Some(path) = &args.config {
        CliConfig::from_file(path)?
    } else {
        CliConfig::load_default()?
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(user) = &args.username {
        config.username = Some(user.clone());
    }
    if let Some(pass) = &args.password {
        config.password = Some(pass.clone());
    }
    if let Some(db) = &args.database {
        config.database = Some(db.clone());
    }
    if let Some(rp) = &args.retention_policy {
        config.retention_policy = Some(rp.clone());
    }
    if let Some(format) = &args.format {
        config.format = format.clone();
    }
    if let Some(precision) = &args.precision {
        config.precision = precision.clone();
    }
    if let Some(consistency) = &args.consistency {
        config.consistency = consistency.clone();
    }
    if let Some(pps) = args.pps {
        config.pps = pps;
    }
    config.ssl |= args.ssl;
    config.unsafe_ssl |= args.unsafe_ssl;
    config.pretty |= args.pretty;

    Ok(config)
}

async fn execute(shell: &mut Shell, query: &str) -> Result<()> {
    info!("Executing query: {}", query);

    shell.connect().await?;
    let _watcher = spawn_interrupt_watcher(shell.reset_interrupt());
    match shell.execute_query(query).await? {
        output if output.is_empty() => {}
        output => println!("{output}"),
    }
    Ok(())
}

async fn run_import(shell: &mut Shell, path: &str, compressed: bool) -> Result<()> {
    info!("Importing file: {}", path);

    shell.connect().await?;
    let _watcher = spawn_interrupt_watcher(shell.reset_interrupt());
    let summary = shell.run_import(path, compressed).await?;
    println!("{summary}");

    if summary.is_success() {
        Ok(())
    } else if summary.interrupted {
        bail!("import interrupted")
    } else {
        bail!("{} points were not inserted", summary.stats.points_failed)
    }
}

async fn run_repl(mut shell: Shell, config: &CliConfig) -> Result<()> {
    let info = shell.connect().await?;
    let mut repl = Repl::new(shell, config)?;
    repl.print_banner(&info.version);
    repl.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "influx",
            "-H",
            "db.example.com",
            "-p",
            "8087",
            "-d",
            "telemetry",
            "--format",
            "csv",
            "--precision",
            "rfc3339",
            "-e",
            "SHOW DATABASES",
        ])
        .unwrap();

        assert_eq!(args.host.as_deref(), Some("db.example.com"));
        assert_eq!(args.port, Some(8087));
        assert_eq!(args.execute.as_deref(), Some("SHOW DATABASES"));
        assert!(!args.import);
    }

    #[test]
    fn test_original_flag_spellings() {
        let args = Args::try_parse_from(["influx", "--unsafeSsl", "--ssl"]).unwrap();
        assert!(args.unsafe_ssl);
        assert!(args.ssl);

        assert!(Args::try_parse_from(["influx", "-v"]).unwrap().version);
        assert!(Args::try_parse_from(["influx", "--version"]).unwrap().version);
        let args = Args::try_parse_from(["influx", "--verbose"]).unwrap();
        assert!(args.verbose && !args.version);
    }

    #[test]
    fn test_import_requires_path() {
        assert!(Args::try_parse_from(["influx", "--import"]).is_err());
        let args =
            Args::try_parse_from(["influx", "--import", "--path", "dump.gz", "--pps", "500"])
                .unwrap();
        assert!(args.import);
        assert_eq!(args.pps, Some(500));
    }

    #[test]
    fn test_command_line_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        CliConfig::builder()
            .host("from-file")
            .port(9000)
            .database("filedb")
            .format("json")
            .build()
            .save(&path)
            .unwrap();

        let args = Args::try_parse_from([
            "influx",
            "--config",
            path.to_str().unwrap(),
            "-p",
            "8087",
            "--precision",
            "ms",
            "--pretty",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();

        assert_eq!(config.host, "from-file");
        assert_eq!(config.port, 8087);
        assert_eq!(config.database.as_deref(), Some("filedb"));
        assert_eq!(config.format, "json");
        assert_eq!(config.precision, "ms");
        assert!(config.pretty);

        let session = Session::from_config(&config).unwrap();
        assert_eq!(session.target(), "from-file:8087");
    }

    #[tokio::test]
    async fn test_execute_mode_output() {
        use crate::repl::CommandResult;
        use influx_client::{MemoryTransport, Transport};
        use std::sync::Arc;

        let transport = Arc::new(MemoryTransport::new());
        let connector_transport = Arc::clone(&transport);
        let mut shell = Shell::new(
            Session::default(),
            Box::new(move |_| Ok(Arc::clone(&connector_transport) as Arc<dyn Transport>)),
        );

        assert_eq!(
            shell.process_line("SHOW DATABASES").await.unwrap(),
            CommandResult::Continue
        );
        assert_eq!(transport.queries()[0].query, "SHOW DATABASES");
    }
}
