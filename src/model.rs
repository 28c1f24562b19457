//! Typed records produced by the probes and consumed by the report renderer.
//!
//! Every field that can degrade on a probe failure carries an explicit
//! sentinel (`"UNKNOWN"`, `"TIMEOUT"`) or an `Option`, so the renderer never
//! has to guess at missing keys.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

/// Sentinel for a field whose query returned no usable value.
pub const UNKNOWN: &str = "UNKNOWN";

/// Sentinel for a field whose query exceeded the command timeout.
pub const TIMEOUT: &str = "TIMEOUT";

/// One line of the oratab registry: instance identifier plus the root of the
/// Oracle installation it runs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceEntry {
    pub sid: String,
    pub install_path: PathBuf,
}

/// Replication role of a database instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Primary,
    PhysicalStandby,
    Unknown,
}

impl Role {
    /// Maps the `DATABASE_ROLE` column value. Anything unrecognized
    /// (including an empty string) is `Unknown`.
    pub fn from_column(value: &str) -> Self {
        match value.trim() {
            "PRIMARY" => Role::Primary,
            "PHYSICAL STANDBY" => Role::PhysicalStandby,
            _ => Role::Unknown,
        }
    }

    pub fn is_primary(self) -> bool {
        matches!(self, Role::Primary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Primary => "PRIMARY",
            Role::PhysicalStandby => "PHYSICAL STANDBY",
            Role::Unknown => UNKNOWN,
        }
    }
}

/// Redo apply lag of a standby, normalized to minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ApplyLag {
    Minutes(f64),
    Unknown,
    /// The lag query produced output we could not interpret.
    ParseError,
}

impl ApplyLag {
    pub fn minutes(self) -> Option<f64> {
        match self {
            ApplyLag::Minutes(m) => Some(m),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApplyLag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyLag::Minutes(m) => write!(f, "{:.1}", m),
            ApplyLag::Unknown => write!(f, "{}", UNKNOWN),
            ApplyLag::ParseError => write!(f, "PARSE_ERROR"),
        }
    }
}

/// Managed-recovery state of a standby instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandbyStatus {
    pub mrp_running: bool,
    /// MRP process status column, or "NOT RUNNING" when no MRP row exists.
    pub mrp_state: String,
    /// Redo sequence the MRP is working on, when reported.
    pub mrp_sequence: Option<i64>,
    pub apply_lag: ApplyLag,
    /// Completion time of the newest applied archive log, or a sentinel.
    pub last_applied_time: String,
}

impl Default for StandbyStatus {
    fn default() -> Self {
        Self {
            mrp_running: false,
            mrp_state: "NOT RUNNING".to_string(),
            mrp_sequence: None,
            apply_lag: ApplyLag::Unknown,
            last_applied_time: UNKNOWN.to_string(),
        }
    }
}

/// Size and utilization of one tablespace, in megabytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablespaceUsage {
    pub name: String,
    pub size_mb: f64,
    pub free_mb: f64,
    pub max_size_mb: f64,
    pub used_pct: f64,
}

impl TablespaceUsage {
    /// Builds a row with `used_pct` recomputed from the sizes. The query
    /// also reports a percentage but it is never trusted; a zero-capacity
    /// tablespace reads as fully used.
    pub fn new(name: String, size_mb: f64, free_mb: f64, max_size_mb: f64) -> Self {
        let used_pct = if max_size_mb > 0.0 {
            (max_size_mb - free_mb) / max_size_mb * 100.0
        } else {
            100.0
        };
        Self {
            name,
            size_mb,
            free_mb,
            max_size_mb,
            used_pct,
        }
    }
}

/// Everything collected about one database instance. Exactly one of these
/// exists per registry entry, even when the probe fails outright.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceStatus {
    pub sid: String,
    pub install_path: PathBuf,
    pub accessible: bool,
    pub role: Role,
    pub open_mode: String,
    pub instance_name: String,
    pub instance_state: String,
    pub database_state: String,
    pub version: String,
    /// `None` renders as "UNKNOWN".
    pub active_connections: Option<i64>,
    /// Ordered by descending utilization.
    pub tablespaces: Vec<TablespaceUsage>,
    /// Present only when the role is not PRIMARY.
    pub standby: Option<StandbyStatus>,
    pub error: Option<String>,
}

impl InstanceStatus {
    /// Placeholder status for an instance that could not be reached at all.
    pub fn inaccessible(entry: &InstanceEntry, error: Option<String>) -> Self {
        Self {
            sid: entry.sid.clone(),
            install_path: entry.install_path.clone(),
            accessible: false,
            role: Role::Unknown,
            open_mode: UNKNOWN.to_string(),
            instance_name: entry.sid.clone(),
            instance_state: UNKNOWN.to_string(),
            database_state: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
            active_connections: None,
            tablespaces: Vec::new(),
            standby: None,
            error,
        }
    }
}

/// Run-time state of one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListenerState {
    Up,
    Down,
    Timeout,
}

impl ListenerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ListenerState::Up => "UP",
            ListenerState::Down => "DOWN",
            ListenerState::Timeout => TIMEOUT,
        }
    }
}

/// Status of one listener under one installation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerStatus {
    pub name: String,
    pub install_path: PathBuf,
    pub state: ListenerState,
    pub services: BTreeSet<String>,
    pub version: Option<String>,
    pub start_date: Option<String>,
}

impl ListenerStatus {
    pub fn new(name: &str, install_path: &std::path::Path, state: ListenerState) -> Self {
        Self {
            name: name.to_string(),
            install_path: install_path.to_path_buf(),
            state,
            services: BTreeSet::new(),
            version: None,
            start_date: None,
        }
    }
}

/// Result of one full collection pass over the estate.
#[derive(Debug, Clone, Default)]
pub struct EstateSnapshot {
    pub instances: Vec<InstanceStatus>,
    pub listeners: Vec<ListenerStatus>,
}
