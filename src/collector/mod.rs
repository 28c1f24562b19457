//! Status collection: subprocess plumbing, per-instance probes, and the
//! estate-level pass that ties them together.

pub mod db_probe;
pub mod listener;
pub mod mock;
pub mod runner;
pub mod sqlplus;
pub mod traits;

pub use db_probe::DbProbe;
pub use listener::ListenerProbe;
pub use runner::RealRunner;
pub use sqlplus::{ProbeError, SqlPlus, tool_env};
pub use traits::{
    CommandOutput, CommandRequest, CommandRunner, ExecError, FileSystem, RealFs,
};

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::model::{EstateSnapshot, InstanceEntry};

/// Default bound on every external command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Walks the registry entries, probes each instance sequentially, and
/// probes the listeners of each distinct installation exactly once.
pub struct EstateCollector<'a> {
    runner: &'a dyn CommandRunner,
    fs: &'a dyn FileSystem,
    timeout: Duration,
}

impl<'a> EstateCollector<'a> {
    pub fn new(runner: &'a dyn CommandRunner, fs: &'a dyn FileSystem, timeout: Duration) -> Self {
        Self {
            runner,
            fs,
            timeout,
        }
    }

    pub fn collect(&self, entries: &[InstanceEntry]) -> EstateSnapshot {
        let mut snapshot = EstateSnapshot::default();
        let mut probed_installs: HashSet<PathBuf> = HashSet::new();

        for entry in entries {
            info!("probing instance {}", entry.sid);
            let probe = DbProbe::new(self.runner, &entry.install_path, &entry.sid, self.timeout);
            let status = probe.collect(entry);
            info!(
                "instance {}: accessible={} role={}",
                entry.sid,
                status.accessible,
                status.role.as_str()
            );
            snapshot.instances.push(status);

            // Several instances usually share an installation; its listeners
            // are probed once, in first-seen order.
            if !probed_installs.insert(entry.install_path.clone()) {
                continue;
            }
            let listener_probe =
                ListenerProbe::new(self.runner, self.fs, &entry.install_path, self.timeout);
            for status in listener_probe.collect() {
                info!(
                    "listener {} under {}: {}",
                    status.name,
                    status.install_path.display(),
                    status.state.as_str()
                );
                snapshot.listeners.push(status);
            }
        }

        snapshot
    }
}
