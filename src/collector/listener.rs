//! Listener discovery and status probe.
//!
//! Listener names are discovered from `listener.ora` under the install's
//! `network/admin` directory; each discovered name is then checked with
//! `lsnrctl status NAME`. Discovery falls back to the default name
//! `LISTENER` when no configuration file is readable.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use super::sqlplus::tool_env;
use super::traits::{CommandRequest, CommandRunner, FileSystem};
use crate::model::{ListenerState, ListenerStatus};

/// Marker lsnrctl prints on a completed status request.
const SUCCESS_MARKER: &str = "The command completed successfully";
/// TNS error for "no listener at this address".
const NO_LISTENER_MARKER: &str = "TNS-12541";

static NAMED_LISTENER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\w+)_LISTENER\s*=").unwrap());
static DEFAULT_LISTENER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(LISTENER)\s*=").unwrap());
static SERVICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Service "([^"]+)""#).unwrap());
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Version\s+([\d.]+)").unwrap());
static START_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Start Date\s+(.+)").unwrap());

/// Probes the listeners of a single Oracle installation.
pub struct ListenerProbe<'a> {
    runner: &'a dyn CommandRunner,
    fs: &'a dyn FileSystem,
    install_path: PathBuf,
    timeout: Duration,
}

impl<'a> ListenerProbe<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        fs: &'a dyn FileSystem,
        install_path: &Path,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            fs,
            install_path: install_path.to_path_buf(),
            timeout,
        }
    }

    /// Distinct listener names configured for this installation, sorted.
    ///
    /// A `NAME_LISTENER = ...` block configures listener `NAME`; a bare
    /// `LISTENER = ...` block configures the default. `SID_LIST_*` blocks
    /// describe registrations, not listeners, and are skipped.
    pub fn discover_names(&self) -> Vec<String> {
        let config = self.install_path.join("network/admin/listener.ora");
        let content = match self.fs.read_to_string(&config) {
            Ok(content) => content,
            Err(e) => {
                debug!(
                    "no readable listener.ora at {}: {}; assuming default listener",
                    config.display(),
                    e
                );
                return vec!["LISTENER".to_string()];
            }
        };

        let mut names = BTreeSet::new();
        for caps in NAMED_LISTENER_RE.captures_iter(&content) {
            let name = &caps[1];
            if name.starts_with("SID_LIST") {
                continue;
            }
            names.insert(name.to_string());
        }
        for caps in DEFAULT_LISTENER_RE.captures_iter(&content) {
            names.insert(caps[1].to_string());
        }

        if names.is_empty() {
            names.insert("LISTENER".to_string());
        }
        names.into_iter().collect()
    }

    /// Runs `lsnrctl status NAME` and classifies the outcome.
    pub fn probe(&self, name: &str) -> ListenerStatus {
        let lsnrctl = self.install_path.join("bin/lsnrctl");
        let mut request = CommandRequest::new(&lsnrctl, self.timeout)
            .arg("status")
            .arg(name);
        for (key, value) in tool_env(&self.install_path, None) {
            request = request.env(key, value);
        }

        let output = match self.runner.run(&request) {
            Ok(output) => output,
            Err(e) if e.is_timeout() => {
                warn!("listener {} status check timed out: {}", name, e);
                return ListenerStatus::new(name, &self.install_path, ListenerState::Timeout);
            }
            Err(e) => {
                warn!("listener {} status check failed: {}", name, e);
                return ListenerStatus::new(name, &self.install_path, ListenerState::Down);
            }
        };

        let text = format!("{}{}", output.stdout, output.stderr);
        let up = output.success
            && text.contains(SUCCESS_MARKER)
            && !text.contains(NO_LISTENER_MARKER);
        if !up {
            return ListenerStatus::new(name, &self.install_path, ListenerState::Down);
        }

        let mut status = ListenerStatus::new(name, &self.install_path, ListenerState::Up);
        status.version = VERSION_RE
            .captures(&text)
            .map(|caps| caps[1].to_string());
        status.start_date = START_DATE_RE
            .captures(&text)
            .map(|caps| caps[1].trim().to_string());
        for caps in SERVICE_RE.captures_iter(&text) {
            status.services.insert(caps[1].to_string());
        }
        status
    }

    /// Discovers and probes every listener of this installation.
    pub fn collect(&self) -> Vec<ListenerStatus> {
        self.discover_names()
            .iter()
            .map(|name| self.probe(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner};

    const HOME: &str = "/u01/app/oracle/product/19";

    fn ora_path() -> String {
        format!("{}/network/admin/listener.ora", HOME)
    }

    fn probe<'a>(runner: &'a MockRunner, fs: &'a MockFs) -> ListenerProbe<'a> {
        ListenerProbe::new(runner, fs, Path::new(HOME), Duration::from_secs(30))
    }

    const UP_OUTPUT: &str = "\
LSNRCTL for Linux: Version 19.0.0.0.0 - Production
Start Date                12-AUG-2026 04:10:22
Service \"orcl\" has 1 instance(s).
Service \"orclXDB\" has 1 instance(s).
The command completed successfully
";

    #[test]
    fn discovers_named_and_default_listeners() {
        let runner = MockRunner::new();
        let mut fs = MockFs::new();
        fs.add_file(
            ora_path(),
            "SALES_LISTENER =\n  (DESCRIPTION = (ADDRESS = x))\n\
             LISTENER =\n  (DESCRIPTION = (ADDRESS = y))\n",
        );
        assert_eq!(probe(&runner, &fs).discover_names(), vec!["LISTENER", "SALES"]);
    }

    #[test]
    fn sid_list_blocks_are_not_listeners() {
        let runner = MockRunner::new();
        let mut fs = MockFs::new();
        fs.add_file(
            ora_path(),
            "SALES_LISTENER =\n  (DESCRIPTION = x)\n\
             SID_LIST_SALES_LISTENER =\n  (SID_LIST = y)\n",
        );
        assert_eq!(probe(&runner, &fs).discover_names(), vec!["SALES"]);
    }

    #[test]
    fn missing_config_falls_back_to_default_name() {
        let runner = MockRunner::new();
        let fs = MockFs::new();
        assert_eq!(probe(&runner, &fs).discover_names(), vec!["LISTENER"]);
    }

    #[test]
    fn config_without_listener_blocks_falls_back_too() {
        let runner = MockRunner::new();
        let mut fs = MockFs::new();
        fs.add_file(ora_path(), "# comments only\n");
        assert_eq!(probe(&runner, &fs).discover_names(), vec!["LISTENER"]);
    }

    #[test]
    fn up_listener_parses_details() {
        let runner = MockRunner::new().respond_on("status LISTENER", UP_OUTPUT);
        let fs = MockFs::new();
        let status = probe(&runner, &fs).probe("LISTENER");

        assert_eq!(status.state, ListenerState::Up);
        assert_eq!(status.version.as_deref(), Some("19.0.0.0.0"));
        assert_eq!(status.start_date.as_deref(), Some("12-AUG-2026 04:10:22"));
        let services: Vec<&str> = status.services.iter().map(String::as_str).collect();
        assert_eq!(services, vec!["orcl", "orclXDB"]);
    }

    #[test]
    fn tns_12541_means_down_despite_zero_exit() {
        let output = "TNS-12541: TNS:no listener\nThe command completed successfully\n";
        let runner = MockRunner::new().respond_on("status LISTENER", output);
        let fs = MockFs::new();
        assert_eq!(
            probe(&runner, &fs).probe("LISTENER").state,
            ListenerState::Down
        );
    }

    #[test]
    fn missing_success_marker_means_down() {
        let runner = MockRunner::new().respond_on("status LISTENER", "partial output\n");
        let fs = MockFs::new();
        assert_eq!(
            probe(&runner, &fs).probe("LISTENER").state,
            ListenerState::Down
        );
    }

    #[test]
    fn timeout_maps_to_timeout_state() {
        let runner = MockRunner::new().timeout_on("status LISTENER");
        let fs = MockFs::new();
        assert_eq!(
            probe(&runner, &fs).probe("LISTENER").state,
            ListenerState::Timeout
        );
    }

    #[test]
    fn probe_runs_lsnrctl_from_the_install() {
        let runner = MockRunner::new().respond_on("status LISTENER", UP_OUTPUT);
        let fs = MockFs::new();
        probe(&runner, &fs).probe("LISTENER");

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from(HOME).join("bin/lsnrctl"));
        assert!(calls[0]
            .env
            .iter()
            .any(|(k, v)| k == "ORACLE_HOME" && v == HOME));
    }
}
