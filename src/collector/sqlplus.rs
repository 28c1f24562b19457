//! sqlplus invocation and CSV output parsing.
//!
//! Queries run through `sqlplus -S "/ as sysdba" @script` with CSV markup
//! enabled, so every result comes back as a header line followed by quoted
//! CSV rows. The parser here is deliberately small: it handles quoted fields
//! with embedded commas and doubled quotes, which is all sqlplus emits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::traits::{CommandOutput, CommandRequest, CommandRunner, ExecError};

/// Error types for a single query against one instance.
#[derive(Debug)]
pub enum ProbeError {
    /// The external command could not run or timed out.
    Exec(ExecError),
    /// The command ran but exited non-zero.
    Failed(String),
    /// The output could not be interpreted.
    Parse(String),
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Exec(e) => write!(f, "{}", e),
            ProbeError::Failed(msg) => write!(f, "sqlplus failed: {}", msg),
            ProbeError::Parse(msg) => write!(f, "unparseable output: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Exec(e) if e.is_timeout())
    }
}

/// Environment for tools under one installation, built per call and handed
/// to the child process. The parent environment is never touched.
pub fn tool_env(install_path: &Path, sid: Option<&str>) -> Vec<(String, String)> {
    let home = install_path.display().to_string();
    let inherited_path = std::env::var("PATH").unwrap_or_default();
    let inherited_ld = std::env::var("LD_LIBRARY_PATH").unwrap_or_default();

    let mut env = vec![
        ("ORACLE_HOME".to_string(), home.clone()),
        ("PATH".to_string(), format!("{}/bin:{}", home, inherited_path)),
        (
            "LD_LIBRARY_PATH".to_string(),
            format!("{}/lib:{}", home, inherited_ld),
        ),
    ];
    if let Some(sid) = sid {
        env.push(("ORACLE_SID".to_string(), sid.to_string()));
    }
    env
}

/// Issues SQL queries against one `(install_path, sid)` pair.
pub struct SqlPlus<'a> {
    runner: &'a dyn CommandRunner,
    install_path: PathBuf,
    sid: String,
    timeout: Duration,
}

impl<'a> SqlPlus<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        install_path: &Path,
        sid: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            install_path: install_path.to_path_buf(),
            sid: sid.to_string(),
            timeout,
        }
    }

    /// Runs one query and returns the raw stdout. Non-zero exit becomes
    /// `ProbeError::Failed` carrying the diagnostic text.
    pub fn run_query(&self, sql: &str) -> Result<CommandOutput, ProbeError> {
        let request = CommandRequest::new(self.install_path.join("bin/sqlplus"), self.timeout)
            .arg("-S")
            .arg("/ as sysdba")
            .script(script_body(sql));
        let request = tool_env(&self.install_path, Some(&self.sid))
            .into_iter()
            .fold(request, |req, (k, v)| req.env(k, v));

        let output = self.runner.run(&request).map_err(ProbeError::Exec)?;
        if !output.success {
            let diag = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(ProbeError::Failed(diag));
        }
        Ok(output)
    }

    /// Runs one query and parses the CSV result rows (header dropped).
    /// An empty result set is `Ok(vec![])`, not an error.
    pub fn query_rows(&self, sql: &str) -> Result<Vec<Vec<String>>, ProbeError> {
        let output = self.run_query(sql)?;
        Ok(parse_csv_rows(&output.stdout))
    }
}

/// Wraps a query in the CSV-markup directives sqlplus needs for
/// machine-readable output.
fn script_body(sql: &str) -> String {
    format!(
        "SET PAGESIZE 0\nSET FEEDBACK OFF\nSET HEADING ON\nSET MARKUP CSV ON\nWHENEVER SQLERROR EXIT FAILURE\n{}\nEXIT;\n",
        sql.trim()
    )
}

/// Parses sqlplus CSV output into data rows, skipping the header line and
/// anything that is not a data line (blank lines, stray messages).
pub fn parse_csv_rows(output: &str) -> Vec<Vec<String>> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    // First non-empty line is the column header.
    let Some(_header) = lines.next() else {
        return Vec::new();
    };
    lines.map(parse_csv_line).collect()
}

/// Splits one CSV line into fields, honoring quotes and doubled-quote
/// escapes.
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field = String::new();
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}
