//! Abstractions for filesystem access and external command execution.
//!
//! The `FileSystem` trait lets the inventory and listener discovery read real
//! files in production and in-memory fixtures in tests. The `CommandRunner`
//! trait does the same for the external Oracle tools (sqlplus, lsnrctl), so
//! probes can be tested without an Oracle installation.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// One bounded invocation of an external tool.
///
/// The environment is carried explicitly and passed to the child process;
/// the parent's global environment is never mutated. When `script` is set,
/// the runner materializes it as a temporary file and appends an `@path`
/// argument (the sqlplus script convention).
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub script: Option<String>,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            script: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn script(mut self, body: impl Into<String>) -> Self {
        self.script = Some(body.into());
        self
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Error types for external command execution.
#[derive(Debug)]
pub enum ExecError {
    /// The binary could not be started.
    Spawn(io::Error),
    /// I/O failure while feeding or draining the child.
    Io(io::Error),
    /// The command exceeded its time bound and was killed.
    Timeout(Duration),
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Spawn(e) => write!(f, "failed to start command: {}", e),
            ExecError::Io(e) => write!(f, "command I/O error: {}", e),
            ExecError::Timeout(d) => write!(f, "command timed out after {}s", d.as_secs()),
        }
    }
}

impl std::error::Error for ExecError {}

impl ExecError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout(_))
    }
}

/// Abstraction for running external commands.
pub trait CommandRunner: Send + Sync {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput, ExecError>;
}
