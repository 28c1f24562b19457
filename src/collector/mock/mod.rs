//! In-memory doubles for the filesystem and command runner traits.
//!
//! Used throughout the test suite to exercise probes and inventory parsing
//! without an Oracle installation on the box.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::{CommandOutput, CommandRequest, CommandRunner, ExecError, FileSystem};

/// In-memory filesystem backed by a path-to-content map.
#[derive(Debug, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, String>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

enum MockResponse {
    Stdout(String),
    Failure(String),
    Timeout,
}

/// Command runner that matches requests against substring rules and records
/// every call for later inspection.
///
/// A rule matches when its pattern occurs in the request's script body or,
/// for scriptless tools like lsnrctl, in the joined argument list. Rules are
/// checked in registration order; an unmatched request yields empty
/// successful output.
pub struct MockRunner {
    rules: Vec<(String, MockResponse)>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Matching requests succeed with the given stdout.
    pub fn respond_on(mut self, pattern: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), MockResponse::Stdout(stdout.into())));
        self
    }

    /// Matching requests exit unsuccessfully with the given stderr.
    pub fn fail_on(mut self, pattern: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), MockResponse::Failure(stderr.into())));
        self
    }

    /// Matching requests report a timeout, as if the child had been killed.
    pub fn timeout_on(mut self, pattern: impl Into<String>) -> Self {
        self.rules.push((pattern.into(), MockResponse::Timeout));
        self
    }

    /// All requests seen so far, in order.
    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(request.clone());

        let haystack = match &request.script {
            Some(script) => script.clone(),
            None => request.args.join(" "),
        };

        for (pattern, response) in &self.rules {
            if !haystack.contains(pattern.as_str()) {
                continue;
            }
            return match response {
                MockResponse::Stdout(stdout) => Ok(CommandOutput {
                    success: true,
                    stdout: stdout.clone(),
                    stderr: String::new(),
                }),
                MockResponse::Failure(stderr) => Ok(CommandOutput {
                    success: false,
                    stdout: String::new(),
                    stderr: stderr.clone(),
                }),
                MockResponse::Timeout => Err(ExecError::Timeout(request.timeout)),
            };
        }

        Ok(CommandOutput {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
