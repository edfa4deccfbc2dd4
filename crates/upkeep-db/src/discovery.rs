use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use upkeep_common::{Error, Result};

use crate::database::Database;
use crate::migrations::SqlMigration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

#[derive(Default)]
struct Pair {
    stem: String,
    up: Option<String>,
    down: Option<String>,
}

/// Load `<version>_<name>.up.sql` and optional `<version>_<name>.down.sql`
/// files from `dir`, ordered by numeric version.
///
/// Each migration is named by its file stem (`0003_add_incident_index`).
/// Files without a `.sql` extension are ignored.
pub fn discover_sql_migrations(dir: &Path, db: Arc<Database>) -> Result<Vec<SqlMigration>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::Discovery(format!("cannot read migrations dir {}: {e}", dir.display()))
    })?;

    let mut by_version: BTreeMap<u64, Pair> = BTreeMap::new();

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        if !filename.ends_with(".sql") {
            debug!("ignoring non-SQL file in migrations dir: {filename}");
            continue;
        }

        let (version, stem, direction) = parse_filename(&filename)?;
        let sql = fs::read_to_string(&path)?;

        let pair = by_version.entry(version).or_default();
        if pair.stem.is_empty() {
            pair.stem = stem;
        } else if pair.stem != stem {
            return Err(Error::Discovery(format!(
                "duplicate migration version {version}: {} and {stem}",
                pair.stem
            )));
        }

        let slot = match direction {
            Direction::Up => &mut pair.up,
            Direction::Down => &mut pair.down,
        };
        *slot = Some(sql);
    }

    if by_version.is_empty() {
        warn!("no SQL migrations found in {}", dir.display());
    }

    by_version
        .into_values()
        .map(|pair| -> Result<SqlMigration> {
            let up = pair.up.ok_or_else(|| {
                Error::Discovery(format!("{} has a down file but no up file", pair.stem))
            })?;
            Ok(SqlMigration::new(db.clone(), pair.stem, up, pair.down))
        })
        .collect()
}

fn parse_filename(filename: &str) -> Result<(u64, String, Direction)> {
    let invalid = |reason: &str| {
        Error::Discovery(format!("invalid migration filename '{filename}': {reason}"))
    };

    let (stem, direction) = if let Some(stem) = filename.strip_suffix(".up.sql") {
        (stem, Direction::Up)
    } else if let Some(stem) = filename.strip_suffix(".down.sql") {
        (stem, Direction::Down)
    } else {
        return Err(invalid("expected <version>_<name>.up.sql or .down.sql"));
    };

    let (version_str, name) = stem
        .split_once('_')
        .ok_or_else(|| invalid("expected <version>_<name>"))?;

    if name.is_empty() {
        return Err(invalid("name segment must not be empty"));
    }
    if version_str.is_empty() || !version_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("version must be a positive integer"));
    }

    let version: u64 = version_str
        .parse()
        .map_err(|_| invalid("version is out of range"))?;
    if version == 0 {
        return Err(invalid("version must be a positive integer"));
    }

    Ok((version, stem.to_string(), direction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::Migration;

    fn db() -> Arc<Database> {
        Arc::new(Database::in_memory().unwrap())
    }

    #[test]
    fn orders_numerically_and_pairs_up_and_down() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("10_c.up.sql"), "SELECT 10;").unwrap();
        fs::write(tmp.path().join("2_b.up.sql"), "SELECT 2;").unwrap();
        fs::write(tmp.path().join("2_b.down.sql"), "SELECT -2;").unwrap();
        fs::write(tmp.path().join("1_a.up.sql"), "SELECT 1;").unwrap();
        fs::write(tmp.path().join("README.md"), "notes").unwrap();

        let migrations = discover_sql_migrations(tmp.path(), db()).unwrap();
        let names: Vec<&str> = migrations.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["1_a", "2_b", "10_c"]);
        assert_eq!(migrations[1].up_sql(), "SELECT 2;");
        assert_eq!(migrations[1].down_sql(), Some("SELECT -2;"));
        assert!(migrations[0].down_sql().is_none());
    }

    #[test]
    fn duplicate_version_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("1_a.up.sql"), "SELECT 1;").unwrap();
        fs::write(tmp.path().join("1_other.up.sql"), "SELECT 1;").unwrap();

        let err = discover_sql_migrations(tmp.path(), db()).err().unwrap();
        assert!(err.to_string().contains("duplicate migration version 1"));
    }

    #[test]
    fn down_without_up_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("3_orphan.down.sql"), "SELECT 1;").unwrap();

        let err = discover_sql_migrations(tmp.path(), db()).err().unwrap();
        assert!(matches!(err, Error::Discovery(_)));
        assert!(err.to_string().contains("no up file"));
    }

    #[test]
    fn rejects_malformed_filenames() {
        for name in ["init.sql", "x_a.up.sql", "0_a.up.sql", "5_.up.sql", "7.up.sql"] {
            assert!(parse_filename(name).is_err(), "{name} should be rejected");
        }
        let (version, stem, direction) = parse_filename("0004_seed_statuses.down.sql").unwrap();
        assert_eq!(version, 4);
        assert_eq!(stem, "0004_seed_statuses");
        assert_eq!(direction, Direction::Down);
    }

    #[test]
    fn missing_dir_is_discovery_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = discover_sql_migrations(&tmp.path().join("nope"), db())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Discovery(_)));
    }

    #[test]
    fn empty_dir_yields_no_migrations() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(discover_sql_migrations(tmp.path(), db()).unwrap().is_empty());
    }
}
