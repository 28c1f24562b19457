//! Bounded execution of external commands.
//!
//! Every invocation is guarded by an explicit timeout; a child that overruns
//! is killed and reaped so a hung tool can never stall the rest of the run.

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use tracing::debug;
use wait_timeout::ChildExt;

use super::traits::{CommandOutput, CommandRequest, CommandRunner, ExecError};

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealRunner;

impl RealRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for RealRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput, ExecError> {
        // The script lives in a named temp file for the duration of the
        // command; dropping the guard removes it on every exit path.
        let script_file = match &request.script {
            Some(body) => {
                let mut file = tempfile::Builder::new()
                    .prefix("orastat-")
                    .suffix(".sql")
                    .tempfile()
                    .map_err(ExecError::Io)?;
                file.write_all(body.as_bytes()).map_err(ExecError::Io)?;
                file.flush().map_err(ExecError::Io)?;
                Some(file)
            }
            None => None,
        };

        let mut command = Command::new(&request.program);
        command.args(&request.args);
        if let Some(file) = &script_file {
            command.arg(format!("@{}", file.path().display()));
        }
        for (key, value) in &request.env {
            command.env(key, value);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            "running {} {}",
            request.program.display(),
            request.args.join(" ")
        );

        let mut child = command.spawn().map_err(ExecError::Spawn)?;

        let status = match child.wait_timeout(request.timeout).map_err(ExecError::Io)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Timeout(request.timeout));
            }
        };

        // The child has exited, so both pipes are at EOF and drain without
        // blocking.
        Ok(CommandOutput {
            success: status.success(),
            stdout: drain(child.stdout.take())?,
            stderr: drain(child.stderr.take())?,
        })
    }
}

fn drain<R: Read>(pipe: Option<R>) -> Result<String, ExecError> {
    let Some(mut pipe) = pipe else {
        return Ok(String::new());
    };
    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes).map_err(ExecError::Io)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn runs_a_simple_command() {
        let runner = RealRunner::new();
        let req = CommandRequest::new("/bin/echo", Duration::from_secs(5)).arg("hello");
        let out = runner.run(&req).unwrap();
        assert!(out.success);
        assert!(out.stdout.contains("hello"));
    }

    #[test]
    fn reports_spawn_failure_for_missing_binary() {
        let runner = RealRunner::new();
        let req = CommandRequest::new("/nonexistent/bin/sqlplus", Duration::from_secs(5));
        match runner.run(&req) {
            Err(ExecError::Spawn(_)) => {}
            other => panic!("expected spawn error, got {:?}", other.map(|o| o.success)),
        }
    }

    #[test]
    fn kills_commands_that_exceed_the_timeout() {
        let runner = RealRunner::new();
        let req = CommandRequest::new("/bin/sleep", Duration::from_millis(100)).arg("10");
        match runner.run(&req) {
            Err(e) if e.is_timeout() => {}
            other => panic!("expected timeout, got {:?}", other.map(|o| o.success)),
        }
    }

    #[test]
    fn script_is_materialized_and_passed_as_argument() {
        let runner = RealRunner::new();
        let req = CommandRequest::new("/bin/echo", Duration::from_secs(5))
            .script("SELECT 1 FROM dual;");
        let out = runner.run(&req).unwrap();
        assert!(out.stdout.trim_start().starts_with('@'));
        assert!(out.stdout.contains(".sql"));
    }
}
