//! Interactive shell for InfluxDB.
//!
//! [`Shell`] owns the session and dispatches commands; [`Repl`] wraps it in
//! a line editor with history and completion.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, EditMode, Editor, Helper};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use influx_client::{
    Client, ClientConfig, ClientResult, QueryRequest, ServerInfo, Transport, WriteRequest,
};

use crate::commands::Command;
use crate::config::CliConfig;
use crate::formatter;
use crate::import::{self, ImportConfig, ImportSummary, Importer};
use crate::session::Session;

/// The prompt shown when waiting for input.
const PROMPT: &str = "> ";

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Continue the loop.
    Continue,
    /// Exit the loop.
    Exit,
    /// Print a message and continue.
    Output(String),
}

/// Builds a transport for a connection snapshot.
pub type Connector = Box<dyn Fn(&ClientConfig) -> ClientResult<Arc<dyn Transport>> + Send + Sync>;

/// Connector producing HTTP clients.
pub fn http_connector() -> Connector {
    Box::new(|config| {
        let client = Client::new(config.clone())?;
        Ok(Arc::new(client) as Arc<dyn Transport>)
    })
}

/// Command dispatcher holding the session state.
pub struct Shell {
    session: Session,
    connector: Connector,
    /// Transport for the last connection snapshot.
    transport: Option<(ClientConfig, Arc<dyn Transport>)>,
    cancel: CancellationToken,
}

impl Shell {
    /// Creates a shell.
    pub fn new(session: Session, connector: Connector) -> Self {
        Self {
            session,
            connector,
            transport: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session for mutation.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Returns a transport for the current connection settings.
    ///
    /// A new transport is built whenever the settings have changed since
    /// the last request.
    pub fn transport(&mut self) -> Result<Arc<dyn Transport>> {
        let config = self.session.client_config();
        if let Some((cached, transport)) = &self.transport {
            if *cached == config {
                return Ok(Arc::clone(transport));
            }
        }
        debug!(url = %config.base_url(), "creating transport");
        let transport = (self.connector)(&config)
            .with_context(|| format!("invalid connection settings for {}", self.session.target()))?;
        self.transport = Some((config, Arc::clone(&transport)));
        Ok(transport)
    }

    /// Pings the current target.
    pub async fn connect(&mut self) -> Result<ServerInfo> {
        let transport = self.transport()?;
        let info = tokio::select! {
            _ = self.cancel.cancelled() => bail!("interrupted"),
            info = transport.ping() => info,
        };
        info.with_context(|| format!("failed to connect to {}", self.session.target()))
    }

    /// Switches to a new target. If it cannot be reached the previous
    /// target stays in effect.
    pub async fn reconnect(&mut self, target: &str) -> Result<ServerInfo> {
        let (host, port) = (self.session.host.clone(), self.session.port);
        self.session.set_target(target)?;
        match self.connect().await {
            Ok(info) => Ok(info),
            Err(e) => {
                self.session.host = host;
                self.session.port = port;
                Err(e)
            }
        }
    }

    /// Classifies and executes one line of input.
    pub async fn process_line(&mut self, line: &str) -> Result<CommandResult> {
        Command::parse(line).execute(self).await
    }

    /// Runs a query and renders the response in the session's format.
    ///
    /// Timestamps are always requested in nanoseconds and converted for
    /// display, so changing the precision never changes the query.
    pub async fn execute_query(&mut self, query: &str) -> Result<String> {
        let transport = self.transport()?;
        let request = QueryRequest::new(query, self.session.database.clone())
            .retention_policy(self.session.retention_policy.clone());

        let response = tokio::select! {
            _ = self.cancel.cancelled() => bail!("interrupted"),
            response = transport.query(&request) => response?,
        };
        if let Some(error) = response.first_error() {
            bail!("{error}");
        }

        let session = &self.session;
        formatter::render(&response, session.format, session.precision, session.pretty)
    }

    /// Writes a single point given as `<line>` or `into <rp> <line>`.
    pub async fn write_point(&mut self, args: &str) -> Result<()> {
        let (retention_policy, line) = split_insert(args, &self.session.retention_policy)?;
        import::line::validate(line).with_context(|| format!("invalid point '{line}'"))?;

        let session = &self.session;
        let request = WriteRequest::new(session.database.clone(), vec![line.to_string()])
            .retention_policy(retention_policy)
            .consistency(session.consistency)
            .precision(session.precision);

        let transport = self.transport()?;
        tokio::select! {
            _ = self.cancel.cancelled() => bail!("interrupted"),
            result = transport.write(&request) => result?,
        }
        debug!(database = %request.database, "point written");
        Ok(())
    }

    /// Imports an export file with the session's settings.
    ///
    /// A read error part way through reports the progress made before it.
    pub async fn run_import(&mut self, path: &str, compressed: bool) -> Result<ImportSummary> {
        let config = ImportConfig::from_session(&self.session, path, compressed);
        let transport = self.transport()?;
        Importer::new(transport, config)
            .with_cancellation(self.cancel.clone())
            .run()
            .await
            .map_err(|e| match e.summary() {
                Some(summary) => anyhow!("{e}\n{summary}"),
                None => e.into(),
            })
    }

    /// Starts a fresh cancellation scope and returns its token.
    pub fn reset_interrupt(&mut self) -> CancellationToken {
        self.cancel = CancellationToken::new();
        self.cancel.clone()
    }
}

fn split_insert<'a>(args: &'a str, default_rp: &str) -> Result<(String, &'a str)> {
    let mut words = args.splitn(3, char::is_whitespace);
    match words.next() {
        Some(first) if first.eq_ignore_ascii_case("into") => {
            let rp = words.next().unwrap_or_default();
            let line = words.next().unwrap_or_default().trim();
            if rp.is_empty() || line.is_empty() {
                bail!("usage: insert into <retention policy> <point>");
            }
            Ok((rp.to_string(), line))
        }
        _ => Ok((default_rp.to_string(), args.trim())),
    }
}

/// Cancels `token` on Ctrl-C until the returned task is aborted.
pub fn spawn_interrupt_watcher(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            token.cancel();
        }
    })
}

/// Line editor helper.
struct ReplHelper {
    /// Meta-commands and query keywords for completion.
    keywords: Vec<&'static str>,
}

impl ReplHelper {
    fn new() -> Self {
        Self {
            keywords: vec![
                "connect", "consistency", "exit", "format", "help", "import", "insert",
                "precision", "pretty", "quit", "settings", "use",
                "ALTER", "ALL", "AND", "AS", "ASC", "BY", "CONTINUOUS", "CREATE", "DATABASE",
                "DATABASES", "DELETE", "DESC", "DROP", "DURATION", "FIELD", "FILL", "FROM",
                "GROUP", "INTO", "KEYS", "LIMIT", "MEASUREMENT", "MEASUREMENTS", "OFFSET",
                "ON", "OR", "ORDER", "POLICIES", "POLICY", "QUERY", "REPLICATION",
                "RETENTION", "SELECT", "SERIES", "SHOW", "SLIMIT", "SOFFSET", "TAG", "TIME",
                "USERS", "WHERE", "WITH",
            ],
        }
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ',')
            .map(|i| i + 1)
            .unwrap_or(0);

        let word = line[start..pos].to_uppercase();
        if word.is_empty() {
            return Ok((start, Vec::new()));
        }
        let matches = self
            .keywords
            .iter()
            .filter(|kw| kw.to_uppercase().starts_with(&word))
            .map(|kw| Pair {
                display: kw.to_string(),
                replacement: kw.to_string(),
            })
            .collect();

        Ok((start, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

/// Interactive loop around a [`Shell`].
pub struct Repl {
    shell: Shell,
    editor: Editor<ReplHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl Repl {
    /// Creates a REPL, loading history if present.
    pub fn new(shell: Shell, config: &CliConfig) -> Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .max_history_size(config.history_size)?
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(ReplHelper::new()));

        let history_file = config.history_path();
        if let Some(path) = &history_file {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    debug!("Failed to load history: {}", e);
                }
            }
        }

        Ok(Self {
            shell,
            editor,
            history_file,
        })
    }

    /// Prints the welcome banner.
    pub fn print_banner(&self, server_version: &str) {
        println!(
            "Connected to {} version {}",
            self.shell.session().client_config().base_url(),
            server_version
        );
        println!("InfluxDB shell version: {}", env!("CARGO_PKG_VERSION"));
    }

    /// Runs until `exit`, `quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    let watcher = spawn_interrupt_watcher(self.shell.reset_interrupt());
                    let result = self.shell.process_line(line).await;
                    watcher.abort();

                    match result {
                        Ok(CommandResult::Continue) => {}
                        Ok(CommandResult::Output(text)) => println!("{text}"),
                        Ok(CommandResult::Exit) => break,
                        Err(e) => eprintln!("ERR: {e:#}"),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    error!("Readline error: {}", e);
                    break;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    fn save_history(&mut self) {
        if let Some(path) = &self.history_file {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = self.editor.save_history(path) {
                debug!("Failed to save history: {}", e);
            }
        }
    }
}
