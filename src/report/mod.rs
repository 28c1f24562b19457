//! HTML report rendering.
//!
//! The collected snapshot is flattened into a view model with classification
//! classes precomputed, then rendered through an embedded minijinja
//! template. Rendering is pure: the same snapshot and metadata always
//! produce the same document, and all values are HTML-escaped by the
//! template engine.

use std::sync::LazyLock;

use minijinja::Environment;
use serde::Serialize;

use crate::model::{
    ApplyLag, EstateSnapshot, InstanceStatus, ListenerState, ListenerStatus, Role, StandbyStatus,
    TablespaceUsage, UNKNOWN,
};

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.add_template("report.html", include_str!("report.html"))
        .unwrap_or_else(|e| panic!("embedded template is invalid: {}", e));
    env
});

/// Rendering failure, wrapping the template engine's error.
#[derive(Debug)]
pub struct RenderError(minijinja::Error);

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "report rendering failed: {}", self.0)
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(e: minijinja::Error) -> Self {
        RenderError(e)
    }
}

/// Host context printed in the report header. Passed in by the caller so
/// rendering stays deterministic.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub hostname: String,
    pub generated_at: String,
}

/// Renders the full status report as a self-contained HTML document.
pub fn render(snapshot: &EstateSnapshot, meta: &ReportMeta) -> Result<String, RenderError> {
    let view = ReportView {
        hostname: &meta.hostname,
        generated_at: &meta.generated_at,
        instances: snapshot.instances.iter().map(InstanceView::from).collect(),
        listeners: snapshot.listeners.iter().map(ListenerView::from).collect(),
    };
    let template = TEMPLATES.get_template("report.html")?;
    Ok(template.render(&view)?)
}

/// CSS class for an apply-lag value. An unknown or unparseable lag is
/// treated as the worst case.
pub fn lag_class(lag: &ApplyLag) -> &'static str {
    match lag.minutes() {
        Some(m) if m <= 5.0 => "good",
        Some(m) if m <= 30.0 => "warning",
        _ => "error",
    }
}

/// CSS class for tablespace utilization.
pub fn usage_class(used_pct: f64) -> &'static str {
    if used_pct < 75.0 {
        "good"
    } else if used_pct < 90.0 {
        "warning"
    } else {
        "error"
    }
}

/// CSS class for an open mode, judged against the instance's role. A
/// standby legitimately sits in MOUNTED or READ ONLY, so those are healthy
/// there and not on a primary.
pub fn open_mode_class(role: Role, open_mode: &str) -> &'static str {
    match role {
        Role::Primary if open_mode.starts_with("READ WRITE") => "good",
        Role::PhysicalStandby
            if matches!(open_mode, "READ ONLY" | "READ ONLY WITH APPLY" | "MOUNTED") =>
        {
            "good"
        }
        _ => "error",
    }
}

pub fn instance_state_class(state: &str) -> &'static str {
    match state {
        "OPEN" => "good",
        "MOUNTED" | "STARTED" => "warning",
        _ => "error",
    }
}

pub fn database_state_class(state: &str) -> &'static str {
    if state == "ACTIVE" { "good" } else { "error" }
}

pub fn listener_class(state: ListenerState) -> &'static str {
    match state {
        ListenerState::Up => "good",
        ListenerState::Timeout => "warning",
        ListenerState::Down => "error",
    }
}

#[derive(Serialize)]
struct ReportView<'a> {
    hostname: &'a str,
    generated_at: &'a str,
    instances: Vec<InstanceView>,
    listeners: Vec<ListenerView>,
}

#[derive(Serialize)]
struct InstanceView {
    sid: String,
    anchor: String,
    install_path: String,
    accessible: bool,
    role: &'static str,
    open_mode: String,
    open_mode_class: &'static str,
    instance_name: String,
    instance_state: String,
    instance_state_class: &'static str,
    database_state: String,
    database_state_class: &'static str,
    version: String,
    connections: String,
    tablespaces: Vec<TablespaceView>,
    standby: Option<StandbyView>,
    error: Option<String>,
}

impl From<&InstanceStatus> for InstanceView {
    fn from(status: &InstanceStatus) -> Self {
        Self {
            sid: status.sid.clone(),
            anchor: format!("db-{}", status.sid),
            install_path: status.install_path.display().to_string(),
            accessible: status.accessible,
            role: status.role.as_str(),
            open_mode: status.open_mode.clone(),
            open_mode_class: open_mode_class(status.role, &status.open_mode),
            instance_name: status.instance_name.clone(),
            instance_state: status.instance_state.clone(),
            instance_state_class: instance_state_class(&status.instance_state),
            database_state: status.database_state.clone(),
            database_state_class: database_state_class(&status.database_state),
            version: status.version.clone(),
            connections: status
                .active_connections
                .map(|n| n.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            tablespaces: status.tablespaces.iter().map(TablespaceView::from).collect(),
            standby: status.standby.as_ref().map(StandbyView::from),
            error: status.error.clone(),
        }
    }
}

#[derive(Serialize)]
struct TablespaceView {
    name: String,
    size_mb: String,
    free_mb: String,
    max_size_mb: String,
    used_pct: String,
    class: &'static str,
}

impl From<&TablespaceUsage> for TablespaceView {
    fn from(ts: &TablespaceUsage) -> Self {
        Self {
            name: ts.name.clone(),
            size_mb: format!("{:.2}", ts.size_mb),
            free_mb: format!("{:.2}", ts.free_mb),
            max_size_mb: format!("{:.2}", ts.max_size_mb),
            used_pct: format!("{:.2}", ts.used_pct),
            class: usage_class(ts.used_pct),
        }
    }
}

#[derive(Serialize)]
struct StandbyView {
    mrp_state: String,
    mrp_class: &'static str,
    mrp_sequence: String,
    apply_lag: String,
    lag_class: &'static str,
    last_applied_time: String,
}

impl From<&StandbyStatus> for StandbyView {
    fn from(standby: &StandbyStatus) -> Self {
        Self {
            mrp_state: standby.mrp_state.clone(),
            mrp_class: if standby.mrp_running { "good" } else { "error" },
            mrp_sequence: standby
                .mrp_sequence
                .map(|n| n.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            apply_lag: standby.apply_lag.to_string(),
            lag_class: lag_class(&standby.apply_lag),
            last_applied_time: standby.last_applied_time.clone(),
        }
    }
}

#[derive(Serialize)]
struct ListenerView {
    name: String,
    install_path: String,
    state: &'static str,
    state_class: &'static str,
    version: String,
    start_date: String,
    services: Vec<String>,
}

impl From<&ListenerStatus> for ListenerView {
    fn from(status: &ListenerStatus) -> Self {
        Self {
            name: status.name.clone(),
            install_path: status.install_path.display().to_string(),
            state: status.state.as_str(),
            state_class: listener_class(status.state),
            version: status.version.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            start_date: status
                .start_date
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            services: status.services.iter().cloned().collect(),
        }
    }
}
