//! Meta-commands understood by the shell.
//!
//! Any input whose first word is not a meta-command is sent to the server
//! as a query, verbatim.

use anyhow::{bail, Result};

use crate::repl::{CommandResult, Shell};

/// A parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `use <db>[.<rp>]`
    Use(String),
    /// `precision <p>`
    Precision(String),
    /// `format <f>`
    Format(String),
    /// `consistency <c>`
    Consistency(String),
    /// `pretty`
    Pretty,
    /// `connect <host[:port]>`
    Connect(String),
    /// `insert [into <rp>] <line>`
    Insert(String),
    /// `import <path> [compressed]`
    Import(String),
    /// `settings`
    Settings,
    /// `help`
    Help,
    /// `exit` or `quit`
    Exit,
    /// Anything else.
    Query(String),
}

impl Command {
    /// Classifies a line of input. Keywords are case-insensitive and a
    /// trailing `;` is dropped from meta-command arguments.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let mut parts = input.splitn(2, char::is_whitespace);
        let keyword = parts
            .next()
            .unwrap_or_default()
            .trim_end_matches(';')
            .to_lowercase();
        let args = parts
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches(';')
            .trim_end()
            .to_string();

        match keyword.as_str() {
            "use" => Command::Use(args),
            "precision" => Command::Precision(args),
            "format" => Command::Format(args),
            "consistency" => Command::Consistency(args),
            "pretty" => Command::Pretty,
            "connect" => Command::Connect(args),
            "insert" => Command::Insert(args),
            "import" => Command::Import(args),
            "settings" => Command::Settings,
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            _ => Command::Query(input.to_string()),
        }
    }

    /// Executes the command against the shell.
    pub async fn execute(self, shell: &mut Shell) -> Result<CommandResult> {
        match self {
            Command::Use(target) => {
                if target.is_empty() {
                    bail!("usage: use <database>[.<retention policy>]");
                }
                let session = shell.session_mut();
                session.use_database(&target)?;
                let mut message = format!("Using database {}", session.database);
                if !session.retention_policy.is_empty() {
                    message.push_str(&format!(
                        "\nUsing retention policy {}",
                        session.retention_policy
                    ));
                }
                Ok(CommandResult::Output(message))
            }

            Command::Precision(value) => {
                set(shell, "precision", &value, "rfc3339, h, m, s, ms, u, ns")
            }

            Command::Format(value) => set(shell, "format", &value, "column, csv, json"),

            Command::Consistency(value) => {
                set(shell, "consistency", &value, "any, one, quorum, all")
            }

            Command::Pretty => {
                let session = shell.session_mut();
                session.pretty = !session.pretty;
                let state = if session.pretty { "enabled" } else { "disabled" };
                Ok(CommandResult::Output(format!("Pretty print {state}")))
            }

            Command::Connect(target) => {
                if target.is_empty() {
                    bail!("usage: connect <host[:port]>");
                }
                let info = shell.reconnect(&target).await?;
                Ok(CommandResult::Output(format!(
                    "Connected to {} version {}",
                    shell.session().client_config().base_url(),
                    info.version
                )))
            }

            Command::Insert(args) => {
                if args.is_empty() {
                    bail!("usage: insert [into <retention policy>] <point>");
                }
                shell.write_point(&args).await?;
                Ok(CommandResult::Continue)
            }

            Command::Import(args) => {
                let mut words = args.split_whitespace();
                let path = match words.next() {
                    Some(path) => path.to_string(),
                    None => bail!("usage: import <path> [compressed]"),
                };
                let compressed = match words.next() {
                    None => false,
                    Some(word) if word.eq_ignore_ascii_case("compressed") => true,
                    Some(word) => bail!("unexpected argument '{word}' to import"),
                };
                let summary = shell.run_import(&path, compressed).await?;
                Ok(CommandResult::Output(summary.to_string()))
            }

            Command::Settings => Ok(CommandResult::Output(shell.session().to_string())),

            Command::Help => Ok(CommandResult::Output(help_text())),

            Command::Exit => Ok(CommandResult::Exit),

            Command::Query(query) => {
                let output = shell.execute_query(&query).await?;
                if output.is_empty() {
                    Ok(CommandResult::Continue)
                } else {
                    Ok(CommandResult::Output(output))
                }
            }
        }
    }
}

fn set(shell: &mut Shell, field: &str, value: &str, expected: &str) -> Result<CommandResult> {
    if value.is_empty() {
        bail!("usage: {field} <{}>", expected.replace(", ", "|"));
    }
    shell.session_mut().set_field(field, value)?;
    Ok(CommandResult::Continue)
}

/// Returns help text.
pub fn help_text() -> String {
    r#"Usage:
  connect <host:port>    connects to another node specified by host:port
  pretty                 toggles pretty print for the json format
  use <db_name>[.<rp>]   sets current database and optionally retention policy
  format <format>        specifies the format of the server responses: json, csv, or column
  precision <format>     specifies the format of the timestamp: rfc3339, h, m, s, ms, u or ns
  consistency <level>    sets write consistency level: any, one, quorum, or all
  settings               outputs the current settings for the shell
  insert <point>         writes a point in line protocol to the current database
  insert into <rp> <pt>  writes a point to the given retention policy
  import <path> [compressed]
                         imports an export file, optionally gzip-compressed
  exit/quit/ctrl+d       quits the influx shell

  show databases         show database names
  show series            show series information
  show measurements      show measurement information
  show tag keys          show tag key information
  show field keys        show field key information

  A full list of influxql commands can be found at:
  https://docs.influxdata.com/influxdb/v1/query_language/"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meta_commands() {
        assert_eq!(Command::parse("use mydb"), Command::Use("mydb".into()));
        assert_eq!(Command::parse("USE \"my db\".rp"), Command::Use("\"my db\".rp".into()));
        assert_eq!(Command::parse("precision ms"), Command::Precision("ms".into()));
        assert_eq!(Command::parse("Format  json "), Command::Format("json".into()));
        assert_eq!(Command::parse("consistency one"), Command::Consistency("one".into()));
        assert_eq!(Command::parse("pretty"), Command::Pretty);
        assert_eq!(Command::parse("connect db:8087"), Command::Connect("db:8087".into()));
        assert_eq!(Command::parse("settings"), Command::Settings);
        assert_eq!(Command::parse("help"), Command::Help);
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("QUIT"), Command::Exit);
    }

    #[test]
    fn test_parse_drops_trailing_semicolon() {
        assert_eq!(Command::parse("use mydb;"), Command::Use("mydb".into()));
        assert_eq!(Command::parse("precision ms ;"), Command::Precision("ms".into()));
        assert_eq!(Command::parse("settings;"), Command::Settings);
        assert_eq!(Command::parse("exit;"), Command::Exit);
        assert_eq!(
            Command::parse("SELECT * FROM cpu;"),
            Command::Query("SELECT * FROM cpu;".into())
        );
    }

    #[test]
    fn test_parse_insert_and_import() {
        assert_eq!(
            Command::parse("insert cpu value=1"),
            Command::Insert("cpu value=1".into())
        );
        assert_eq!(
            Command::parse("INSERT INTO weekly cpu value=1"),
            Command::Insert("INTO weekly cpu value=1".into())
        );
        assert_eq!(
            Command::parse("import /tmp/dump.gz compressed"),
            Command::Import("/tmp/dump.gz compressed".into())
        );
    }

    #[test]
    fn test_parse_queries_verbatim() {
        assert_eq!(
            Command::parse("SELECT * FROM cpu WHERE host = 'a'"),
            Command::Query("SELECT * FROM cpu WHERE host = 'a'".into())
        );
        assert_eq!(
            Command::parse("show databases"),
            Command::Query("show databases".into())
        );
        assert_eq!(Command::parse("user"), Command::Query("user".into()));
    }

    #[test]
    fn test_help_lists_meta_commands() {
        let help = help_text();
        for keyword in ["connect", "pretty", "use", "format", "precision", "insert", "import"] {
            assert!(help.contains(keyword), "missing {keyword}");
        }
    }
}
