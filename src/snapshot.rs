//! Read-only introspection of persisted snapshot files
//!
//! The query surface used against a finished snapshot: locate the latest
//! one in a folder, list its tables, describe a table's columns with
//! sample values, run an arbitrary SELECT. Databases are opened with the
//! read-only flag so a snapshot can never be mutated from here.

use crate::schema::is_safe_identifier;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No `*.db` snapshot files in the given folder.
    #[error("no snapshot (*.db) files found under {0}")]
    NoSnapshots(PathBuf),

    /// A table or column name failed the identifier allow-list check.
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One column of a described table, with up to ten distinct non-null
/// sample values rendered as text.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub sample_values: Vec<String>,
}

/// Result of a read query, every cell rendered as text.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Find the most recently modified `*.db` snapshot under `dir`.
pub fn latest_snapshot(dir: &Path) -> Result<PathBuf, SnapshotError> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == "db") {
            let modified = entry.metadata()?.modified()?;
            if latest.as_ref().map_or(true, |(newest, _)| modified > *newest) {
                latest = Some((modified, path));
            }
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| SnapshotError::NoSnapshots(dir.to_path_buf()))
}

/// List all table names in a snapshot.
pub fn list_tables(db_path: &Path) -> Result<Vec<String>, SnapshotError> {
    let conn = open_read_only(db_path)?;
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tables)
}

/// Describe a table: column names, declared types, and up to ten distinct
/// non-null sample values per column.
pub fn describe_table(db_path: &Path, table_name: &str) -> Result<Vec<ColumnInfo>, SnapshotError> {
    ensure_identifier(table_name)?;
    let conn = open_read_only(db_path)?;

    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table_name))?;
    let columns = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut described = Vec::with_capacity(columns.len());
    for (name, declared_type) in columns {
        ensure_identifier(&name)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT \"{}\" FROM \"{}\" WHERE \"{}\" IS NOT NULL LIMIT 10",
            name, table_name, name
        ))?;
        let sample_values = stmt
            .query_map([], |row| row.get::<_, rusqlite::types::Value>(0))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(render_value)
            .collect();

        described.push(ColumnInfo {
            name,
            declared_type,
            sample_values,
        });
    }
    Ok(described)
}

/// Run an arbitrary read query against a snapshot.
pub fn execute_select(db_path: &Path, query: &str) -> Result<QueryOutput, SnapshotError> {
    let conn = open_read_only(db_path)?;
    let mut stmt = conn.prepare(query)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let rows = stmt
        .query_map([], |row| {
            let mut cells = Vec::with_capacity(column_count);
            for index in 0..column_count {
                cells.push(render_value(row.get::<_, rusqlite::types::Value>(index)?));
            }
            Ok(cells)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QueryOutput { columns, rows })
}

fn open_read_only(db_path: &Path) -> Result<Connection, SnapshotError> {
    Ok(Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?)
}

fn ensure_identifier(name: &str) -> Result<(), SnapshotError> {
    if is_safe_identifier(name) {
        Ok(())
    } else {
        Err(SnapshotError::InvalidIdentifier(name.to_string()))
    }
}

fn render_value(value: rusqlite::types::Value) -> String {
    use rusqlite::types::Value as Sql;

    match value {
        Sql::Null => "NULL".to_string(),
        Sql::Integer(i) => i.to_string(),
        Sql::Real(f) => f.to_string(),
        Sql::Text(s) => s,
        Sql::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use crate::repository::MemoryRepository;
    use crate::target::SqliteTarget;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_snapshot(path: &Path) {
        let mut repository = MemoryRepository::new();
        repository
            .add(
                "virtual_machines",
                flatten(&json!({"id": "vm-1", "name": "worker", "cores": 2})),
            )
            .unwrap();
        repository
            .add(
                "virtual_machines",
                flatten(&json!({"id": "vm-2", "name": "batch", "cores": 4})),
            )
            .unwrap();
        repository
            .add("storage_accounts", flatten(&json!({"id": "sa-1"})))
            .unwrap();

        let mut target = SqliteTarget::create(path).unwrap();
        repository.save_to(&mut target).unwrap();
        target.close().unwrap();
    }

    #[test]
    fn test_latest_snapshot_picks_newest_file() {
        let dir = tempdir().unwrap();
        write_snapshot(&dir.path().join("extract_1.db"));
        std::thread::sleep(std::time::Duration::from_millis(20));
        write_snapshot(&dir.path().join("extract_2.db"));

        let latest = latest_snapshot(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "extract_2.db");
    }

    #[test]
    fn test_latest_snapshot_empty_folder_fails() {
        let dir = tempdir().unwrap();
        let result = latest_snapshot(dir.path());
        assert!(matches!(result, Err(SnapshotError::NoSnapshots(_))));
    }

    #[test]
    fn test_list_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extract.db");
        write_snapshot(&path);

        let tables = list_tables(&path).unwrap();
        assert_eq!(tables, vec!["storage_accounts", "virtual_machines"]);
    }

    #[test]
    fn test_describe_table_with_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extract.db");
        write_snapshot(&path);

        let columns = describe_table(&path, "virtual_machines").unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"id"));
        assert!(names.contains(&"name"));
        assert!(names.contains(&"cores"));

        let cores = columns.iter().find(|c| c.name == "cores").unwrap();
        assert_eq!(cores.declared_type, "INTEGER");
        let mut samples = cores.sample_values.clone();
        samples.sort();
        assert_eq!(samples, vec!["2", "4"]);
    }

    #[test]
    fn test_describe_table_rejects_unsafe_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extract.db");
        write_snapshot(&path);

        let result = describe_table(&path, "x; DROP TABLE y");
        assert!(matches!(result, Err(SnapshotError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_execute_select() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extract.db");
        write_snapshot(&path);

        let output = execute_select(
            &path,
            "SELECT name, cores FROM virtual_machines ORDER BY cores",
        )
        .unwrap();

        assert_eq!(output.columns, vec!["name", "cores"]);
        assert_eq!(
            output.rows,
            vec![
                vec!["worker".to_string(), "2".to_string()],
                vec!["batch".to_string(), "4".to_string()],
            ]
        );
    }

    #[test]
    fn test_snapshot_cannot_be_mutated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extract.db");
        write_snapshot(&path);

        let result = execute_select(&path, "DELETE FROM storage_accounts");
        assert!(matches!(result, Err(SnapshotError::Storage(_))));

        let tables = list_tables(&path).unwrap();
        assert_eq!(tables.len(), 2);
    }
}
