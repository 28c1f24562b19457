//! Instance registry (oratab) parsing.
//!
//! The registry maps instance identifiers to installation directories in
//! colon-delimited lines. Pseudo-entries such as ASM disk groups carry a
//! sentinel prefix (`+` or `*`) and are not database instances.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collector::{FileSystem, RealFs};
use crate::model::InstanceEntry;

/// Well-known registry locations, checked in order.
pub const DEFAULT_LOCATIONS: [&str; 3] = [
    "/etc/oratab",
    "/var/opt/oracle/oratab",
    "/opt/oracle/oratab",
];

/// Error types for inventory loading.
#[derive(Debug)]
pub enum InventoryError {
    /// No registry file at the given path or any default location.
    NotFound { searched: Vec<PathBuf> },
    /// The registry exists but could not be read.
    Io(PathBuf, std::io::Error),
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryError::NotFound { searched } => {
                let paths: Vec<String> =
                    searched.iter().map(|p| p.display().to_string()).collect();
                write!(f, "no oratab registry found (searched: {})", paths.join(", "))
            }
            InventoryError::Io(path, e) => {
                write!(f, "failed to read {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for InventoryError {}

/// Loads instance entries from the registry at `path`, or from the first
/// default location that exists when `path` is `None`.
pub fn load_entries(
    fs: &dyn FileSystem,
    path: Option<&Path>,
) -> Result<Vec<InstanceEntry>, InventoryError> {
    let registry = resolve_registry_path(fs, path)?;
    let content = fs
        .read_to_string(&registry)
        .map_err(|e| InventoryError::Io(registry.clone(), e))?;

    debug!("loading inventory from {}", registry.display());
    Ok(parse_entries(&content))
}

/// Convenience wrapper over the real filesystem.
pub fn load_entries_default(path: Option<&Path>) -> Result<Vec<InstanceEntry>, InventoryError> {
    load_entries(&RealFs::new(), path)
}

fn resolve_registry_path(
    fs: &dyn FileSystem,
    path: Option<&Path>,
) -> Result<PathBuf, InventoryError> {
    if let Some(explicit) = path {
        if fs.exists(explicit) {
            return Ok(explicit.to_path_buf());
        }
        return Err(InventoryError::NotFound {
            searched: vec![explicit.to_path_buf()],
        });
    }

    for location in DEFAULT_LOCATIONS {
        let candidate = PathBuf::from(location);
        if fs.exists(&candidate) {
            return Ok(candidate);
        }
    }

    Err(InventoryError::NotFound {
        searched: DEFAULT_LOCATIONS.iter().map(PathBuf::from).collect(),
    })
}

/// Parses registry content. Comments, blanks, pseudo-entries and malformed
/// lines are skipped; skipping malformed lines is a tolerance policy, not an
/// error.
fn parse_entries(content: &str) -> Vec<InstanceEntry> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split(':');
        let (Some(sid), Some(install_path)) = (parts.next(), parts.next()) else {
            continue;
        };
        let sid = sid.trim();
        let install_path = install_path.trim();
        if sid.is_empty() || install_path.is_empty() {
            continue;
        }
        // ASM and other pseudo-entries.
        if sid.starts_with('+') || sid.starts_with('*') {
            continue;
        }

        entries.push(InstanceEntry {
            sid: sid.to_string(),
            install_path: PathBuf::from(install_path),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    const SAMPLE: &str = "\
# This file is used by ORACLE utilities.
orcl:/u01/app/oracle/product/19:Y

+ASM:/u01/app/grid/19:N
*:/u01/app/oracle/agent:N
report:/u01/app/oracle/product/21:N
broken_line_no_colon
:/u01/missing/sid:Y
";

    #[test]
    fn parses_well_formed_entries_in_order() {
        let entries = parse_entries(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sid, "orcl");
        assert_eq!(
            entries[0].install_path,
            PathBuf::from("/u01/app/oracle/product/19")
        );
        assert_eq!(entries[1].sid, "report");
    }

    #[test]
    fn skips_pseudo_entries_and_comments() {
        let entries = parse_entries(SAMPLE);
        assert!(!entries.iter().any(|e| e.sid.starts_with('+')));
        assert!(!entries.iter().any(|e| e.sid.starts_with('*')));
    }

    #[test]
    fn loads_from_explicit_path() {
        let mut fs = MockFs::new();
        fs.add_file("/custom/oratab", "db1:/u01/db1:Y\n");
        let entries = load_entries(&fs, Some(Path::new("/custom/oratab"))).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sid, "db1");
    }

    #[test]
    fn explicit_path_missing_is_not_found() {
        let fs = MockFs::new();
        let err = load_entries(&fs, Some(Path::new("/custom/oratab"))).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { .. }));
        assert!(err.to_string().contains("/custom/oratab"));
    }

    #[test]
    fn falls_back_through_default_locations() {
        let mut fs = MockFs::new();
        fs.add_file("/var/opt/oracle/oratab", "db2:/u01/db2:N\n");
        let entries = load_entries(&fs, None).unwrap();
        assert_eq!(entries[0].sid, "db2");
    }

    #[test]
    fn no_registry_anywhere_is_fatal() {
        let fs = MockFs::new();
        let err = load_entries(&fs, None).unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { .. }));
    }
}
