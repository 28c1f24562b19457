//! Database instance probe.
//!
//! One probe exists per `(install_path, sid)` pair. Each accessor issues a
//! single query through sqlplus; a failure or timeout degrades that one
//! field to a sentinel and never aborts the rest of the instance, let alone
//! the run.

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use super::sqlplus::{ProbeError, SqlPlus};
use super::traits::CommandRunner;
use crate::model::{
    ApplyLag, InstanceEntry, InstanceStatus, Role, StandbyStatus, TablespaceUsage, TIMEOUT,
    UNKNOWN,
};
use crate::util::parse_lag_minutes;

const TABLESPACE_QUERY: &str = "\
SELECT
    tablespace_name,
    size_mb,
    free_mb,
    max_size_mb,
    ROUND((max_size_mb - free_mb) / max_size_mb * 100, 2) AS used_pct
FROM (
    SELECT
        a.tablespace_name,
        b.size_mb,
        a.free_mb,
        b.max_size_mb
    FROM
        (SELECT tablespace_name, ROUND(SUM(bytes) / 1048576, 2) AS free_mb
         FROM dba_free_space GROUP BY tablespace_name) a,
        (SELECT tablespace_name,
                ROUND(SUM(bytes) / 1048576, 2) AS size_mb,
                ROUND(SUM(GREATEST(bytes, maxbytes)) / 1048576, 2) AS max_size_mb
         FROM dba_data_files GROUP BY tablespace_name) b
    WHERE a.tablespace_name = b.tablespace_name
)
ORDER BY used_pct DESC;";

/// Probes a single database instance through the sqlplus client.
pub struct DbProbe<'a> {
    sqlplus: SqlPlus<'a>,
    sid: String,
}

impl<'a> DbProbe<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        install_path: &Path,
        sid: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            sqlplus: SqlPlus::new(runner, install_path, sid, timeout),
            sid: sid.to_string(),
        }
    }

    /// Trivial connectivity check. Any failure, including a timeout or a
    /// missing binary, reads as "not accessible"; this never errors.
    pub fn is_accessible(&self) -> bool {
        match self.sqlplus.query_rows("SELECT 1 FROM dual;") {
            Ok(rows) => rows.iter().any(|r| r.first().is_some_and(|v| v == "1")),
            Err(e) => {
                warn!("{}: connectivity check failed: {}", self.sid, e);
                false
            }
        }
    }

    /// `v$instance`: instance name, state, database state.
    pub fn instance_state(&self) -> (String, String, String) {
        match self
            .sqlplus
            .query_rows("SELECT instance_name, status, database_status FROM v$instance;")
        {
            Ok(rows) => match rows.first() {
                Some(row) => (
                    field(row, 0),
                    field(row, 1),
                    field(row, 2),
                ),
                None => unknown3(),
            },
            Err(e) => {
                warn!("{}: instance state query failed: {}", self.sid, e);
                degraded3(&e)
            }
        }
    }

    /// `v$database`: replication role and open mode.
    pub fn role(&self) -> (Role, String) {
        match self
            .sqlplus
            .query_rows("SELECT database_role, open_mode FROM v$database;")
        {
            Ok(rows) => match rows.first() {
                Some(row) => (Role::from_column(&field(row, 0)), field(row, 1)),
                None => (Role::Unknown, UNKNOWN.to_string()),
            },
            Err(e) => {
                warn!("{}: role query failed: {}", self.sid, e);
                (Role::Unknown, sentinel(&e))
            }
        }
    }

    /// Version banner from `v$version`.
    pub fn version(&self) -> String {
        match self
            .sqlplus
            .query_rows("SELECT banner FROM v$version WHERE banner LIKE 'Oracle%';")
        {
            Ok(rows) => rows
                .first()
                .map(|row| field(row, 0))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            Err(e) => {
                warn!("{}: version query failed: {}", self.sid, e);
                sentinel(&e)
            }
        }
    }

    /// Count of active user sessions.
    pub fn connection_count(&self) -> Option<i64> {
        let sql = "SELECT COUNT(*) AS active_connections FROM v$session \
                   WHERE status = 'ACTIVE' AND username IS NOT NULL;";
        match self.sqlplus.query_rows(sql) {
            Ok(rows) => rows.first().and_then(|row| row.first()?.parse().ok()),
            Err(e) => {
                warn!("{}: connection count query failed: {}", self.sid, e);
                None
            }
        }
    }

    /// Per-tablespace utilization, ordered by descending usage so the most
    /// at-risk tablespaces surface first.
    pub fn tablespace_usage(&self) -> Vec<TablespaceUsage> {
        let rows = match self.sqlplus.query_rows(TABLESPACE_QUERY) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("{}: tablespace query failed: {}", self.sid, e);
                return Vec::new();
            }
        };

        let mut usages: Vec<TablespaceUsage> = rows
            .iter()
            .filter_map(|row| {
                let name = row.first()?.clone();
                let size_mb = row.get(1)?.parse().ok()?;
                let free_mb = row.get(2)?.parse().ok()?;
                let max_size_mb = row.get(3)?.parse().ok()?;
                Some(TablespaceUsage::new(name, size_mb, free_mb, max_size_mb))
            })
            .collect();

        // Recomputed percentages can reorder rows relative to the query's
        // ORDER BY, so sort again here.
        usages.sort_by(|a, b| {
            b.used_pct
                .partial_cmp(&a.used_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        usages
    }

    /// Standby replication state: MRP process, apply lag, last applied redo.
    /// Issued only when the role is not PRIMARY.
    pub fn standby_status(&self) -> StandbyStatus {
        let mut status = StandbyStatus::default();

        let mrp_sql = "SELECT process, status, sequence# FROM v$managed_standby \
                       WHERE process LIKE 'MRP%';";
        match self.sqlplus.query_rows(mrp_sql) {
            Ok(rows) => {
                if let Some(row) = rows.first() {
                    status.mrp_running = true;
                    status.mrp_state = field(row, 1);
                    status.mrp_sequence = row.get(2).and_then(|v| v.parse().ok());
                }
            }
            Err(e) => {
                warn!("{}: MRP query failed: {}", self.sid, e);
                status.mrp_state = sentinel(&e);
            }
        }

        let lag_sql = "SELECT ROUND((SYSDATE - CAST(SCN_TO_TIMESTAMP(CURRENT_SCN) AS DATE)) \
                       * 24 * 60, 1) AS lag_minutes FROM v$database;";
        status.apply_lag = match self.sqlplus.query_rows(lag_sql) {
            Ok(rows) => match rows.first().and_then(|row| row.first()) {
                Some(raw) => match parse_lag_minutes(raw) {
                    Ok(minutes) => ApplyLag::Minutes(minutes),
                    Err(e) => {
                        warn!("{}: {}", self.sid, e);
                        ApplyLag::ParseError
                    }
                },
                None => ApplyLag::Unknown,
            },
            Err(e) => {
                warn!("{}: apply lag query failed: {}", self.sid, e);
                ApplyLag::Unknown
            }
        };

        let applied_sql = "SELECT TO_CHAR(MAX(completion_time), 'YYYY-MM-DD HH24:MI:SS') \
                           AS last_applied_time FROM v$archived_log WHERE applied = 'YES';";
        status.last_applied_time = match self.sqlplus.query_rows(applied_sql) {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.first())
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| UNKNOWN.to_string()),
            Err(e) => {
                warn!("{}: last applied query failed: {}", self.sid, e);
                sentinel(&e)
            }
        };

        status
    }

    /// Runs the full probe sequence for one registry entry. An instance
    /// that fails the connectivity check is returned as inaccessible, with
    /// the failure reason recorded and no further queries attempted.
    pub fn collect(&self, entry: &InstanceEntry) -> InstanceStatus {
        match self.sqlplus.query_rows("SELECT 1 FROM dual;") {
            Ok(rows) if rows.iter().any(|r| r.first().is_some_and(|v| v == "1")) => {}
            Ok(_) => return InstanceStatus::inaccessible(entry, None),
            Err(e) => {
                warn!("{}: connectivity check failed: {}", self.sid, e);
                return InstanceStatus::inaccessible(entry, Some(e.to_string()));
            }
        }

        let (instance_name, instance_state, database_state) = self.instance_state();
        let (role, open_mode) = self.role();
        let standby = if role.is_primary() {
            None
        } else {
            Some(self.standby_status())
        };

        InstanceStatus {
            sid: entry.sid.clone(),
            install_path: entry.install_path.clone(),
            accessible: true,
            role,
            open_mode,
            instance_name: if instance_name == UNKNOWN {
                entry.sid.clone()
            } else {
                instance_name
            },
            instance_state,
            database_state,
            version: self.version(),
            active_connections: self.connection_count(),
            tablespaces: self.tablespace_usage(),
            standby,
            error: None,
        }
    }
}

fn field(row: &[String], index: usize) -> String {
    row.get(index)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn sentinel(e: &ProbeError) -> String {
    if e.is_timeout() {
        TIMEOUT.to_string()
    } else {
        UNKNOWN.to_string()
    }
}

fn unknown3() -> (String, String, String) {
    (
        UNKNOWN.to_string(),
        UNKNOWN.to_string(),
        UNKNOWN.to_string(),
    )
}

fn degraded3(e: &ProbeError) -> (String, String, String) {
    (sentinel(e), sentinel(e), sentinel(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockRunner;
    use std::path::PathBuf;

    const HOME: &str = "/u01/app/oracle/product/19";

    fn entry(sid: &str) -> InstanceEntry {
        InstanceEntry {
            sid: sid.to_string(),
            install_path: PathBuf::from(HOME),
        }
    }

    fn probe_with<'a>(runner: &'a MockRunner) -> DbProbe<'a> {
        DbProbe::new(runner, Path::new(HOME), "orcl", Duration::from_secs(30))
    }

    fn healthy_primary() -> MockRunner {
        MockRunner::new()
            .respond_on("FROM dual", "\"1\"\n\"1\"\n")
            .respond_on(
                "FROM v$instance",
                "\"INSTANCE_NAME\",\"STATUS\",\"DATABASE_STATUS\"\n\"orcl\",\"OPEN\",\"ACTIVE\"\n",
            )
            .respond_on(
                "database_role",
                "\"DATABASE_ROLE\",\"OPEN_MODE\"\n\"PRIMARY\",\"READ WRITE\"\n",
            )
            .respond_on(
                "FROM v$version",
                "\"BANNER\"\n\"Oracle Database 19c Enterprise Edition 19.21.0.0.0\"\n",
            )
            .respond_on("FROM v$session", "\"ACTIVE_CONNECTIONS\"\n\"42\"\n")
            .respond_on(
                "dba_free_space",
                "\"TABLESPACE_NAME\",\"SIZE_MB\",\"FREE_MB\",\"MAX_SIZE_MB\",\"USED_PCT\"\n\
                 \"USERS\",\"100\",\"80\",\"200\",\"60\"\n\
                 \"SYSTEM\",\"500\",\"25\",\"500\",\"95\"\n",
            )
    }

    #[test]
    fn accessible_when_dual_returns_one() {
        let runner = healthy_primary();
        assert!(probe_with(&runner).is_accessible());
    }

    #[test]
    fn inaccessible_on_command_failure() {
        let runner = MockRunner::new().fail_on("FROM dual", "ORA-01034");
        assert!(!probe_with(&runner).is_accessible());
    }

    #[test]
    fn inaccessible_on_timeout() {
        let runner = MockRunner::new().timeout_on("FROM dual");
        assert!(!probe_with(&runner).is_accessible());
    }

    #[test]
    fn collect_fills_all_fields_for_primary() {
        let runner = healthy_primary();
        let status = probe_with(&runner).collect(&entry("orcl"));

        assert!(status.accessible);
        assert_eq!(status.role, Role::Primary);
        assert_eq!(status.open_mode, "READ WRITE");
        assert_eq!(status.instance_name, "orcl");
        assert_eq!(status.instance_state, "OPEN");
        assert_eq!(status.database_state, "ACTIVE");
        assert!(status.version.starts_with("Oracle Database 19c"));
        assert_eq!(status.active_connections, Some(42));
        assert!(status.standby.is_none());
    }

    #[test]
    fn collect_skips_detail_queries_when_unreachable() {
        let runner = MockRunner::new().fail_on("FROM dual", "ORA-01034");
        let status = probe_with(&runner).collect(&entry("orcl"));

        assert!(!status.accessible);
        assert!(status.error.as_deref().unwrap().contains("ORA-01034"));
        // Only the connectivity check should have run.
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn tablespaces_sorted_by_descending_recomputed_usage() {
        let runner = healthy_primary();
        let usages = probe_with(&runner).tablespace_usage();

        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].name, "SYSTEM");
        assert!((usages[0].used_pct - 95.0).abs() < 1e-9);
        assert_eq!(usages[1].name, "USERS");
        assert!((usages[1].used_pct - 60.0).abs() < 1e-9);
    }

    #[test]
    fn timeout_degrades_field_to_timeout_sentinel() {
        let runner = MockRunner::new().timeout_on("FROM v$version");
        assert_eq!(probe_with(&runner).version(), TIMEOUT);
    }

    #[test]
    fn missing_rows_degrade_to_unknown() {
        let runner = MockRunner::new().respond_on("FROM v$version", "\"BANNER\"\n");
        assert_eq!(probe_with(&runner).version(), UNKNOWN);
    }

    #[test]
    fn standby_status_parses_mrp_and_lag() {
        let runner = MockRunner::new()
            .respond_on(
                "v$managed_standby",
                "\"PROCESS\",\"STATUS\",\"SEQUENCE#\"\n\"MRP0\",\"APPLYING_LOG\",\"118\"\n",
            )
            .respond_on("SCN_TO_TIMESTAMP", "\"LAG_MINUTES\"\n\"3\"\n")
            .respond_on(
                "v$archived_log",
                "\"LAST_APPLIED_TIME\"\n\"2026-08-29 07:15:00\"\n",
            );
        let status = probe_with(&runner).standby_status();

        assert!(status.mrp_running);
        assert_eq!(status.mrp_state, "APPLYING_LOG");
        assert_eq!(status.mrp_sequence, Some(118));
        assert_eq!(status.apply_lag, ApplyLag::Minutes(3.0));
        assert_eq!(status.last_applied_time, "2026-08-29 07:15:00");
    }

    #[test]
    fn standby_lag_in_seconds_normalizes_to_minutes() {
        let runner = MockRunner::new()
            .respond_on("v$managed_standby", "\"PROCESS\"\n")
            .respond_on("SCN_TO_TIMESTAMP", "\"LAG_MINUTES\"\n\"90 seconds\"\n")
            .respond_on("v$archived_log", "\"LAST_APPLIED_TIME\"\n");
        let status = probe_with(&runner).standby_status();

        assert!(!status.mrp_running);
        assert_eq!(status.mrp_state, "NOT RUNNING");
        assert_eq!(status.apply_lag, ApplyLag::Minutes(1.5));
        assert_eq!(status.last_applied_time, UNKNOWN);
    }

    #[test]
    fn unparseable_lag_degrades_to_parse_error() {
        let runner = MockRunner::new()
            .respond_on("v$managed_standby", "\"PROCESS\"\n")
            .respond_on("SCN_TO_TIMESTAMP", "\"LAG_MINUTES\"\n\"not a number\"\n")
            .respond_on("v$archived_log", "\"LAST_APPLIED_TIME\"\n");
        let status = probe_with(&runner).standby_status();
        assert_eq!(status.apply_lag, ApplyLag::ParseError);
    }

    #[test]
    fn standby_collected_for_non_primary_roles() {
        let runner = MockRunner::new()
            .respond_on("FROM dual", "\"1\"\n\"1\"\n")
            .respond_on(
                "FROM v$instance",
                "\"INSTANCE_NAME\",\"STATUS\",\"DATABASE_STATUS\"\n\"sb1\",\"MOUNTED\",\"ACTIVE\"\n",
            )
            .respond_on(
                "database_role",
                "\"DATABASE_ROLE\",\"OPEN_MODE\"\n\"PHYSICAL STANDBY\",\"READ ONLY WITH APPLY\"\n",
            )
            .respond_on("FROM v$version", "\"BANNER\"\n\"Oracle Database 19c\"\n")
            .respond_on("FROM v$session", "\"ACTIVE_CONNECTIONS\"\n\"3\"\n")
            .respond_on("dba_free_space", "\"TABLESPACE_NAME\"\n")
            .respond_on(
                "v$managed_standby",
                "\"PROCESS\",\"STATUS\",\"SEQUENCE#\"\n\"MRP0\",\"APPLYING_LOG\",\"9\"\n",
            )
            .respond_on("SCN_TO_TIMESTAMP", "\"LAG_MINUTES\"\n\"1.5\"\n")
            .respond_on("v$archived_log", "\"LAST_APPLIED_TIME\"\n\"2026-08-29 06:00:00\"\n");

        let status = probe_with(&runner).collect(&entry("sb1"));
        assert_eq!(status.role, Role::PhysicalStandby);
        let standby = status.standby.expect("standby block present");
        assert_eq!(standby.apply_lag, ApplyLag::Minutes(1.5));
    }
}
