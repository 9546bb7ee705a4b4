//! SQLite snapshot target
//!
//! Materializes one table per logical type in a newly created SQLite file,
//! with the schema inferred from the records themselves. Table and column
//! names are normalized, checked against the identifier allow-list, and
//! double-quoted before interpolation into DDL; row values always go
//! through bound parameters. Each table's insert is committed on its own,
//! so earlier tables survive a later one failing.

use crate::flatten::FlatRecord;
use crate::schema::{is_safe_identifier, ColumnDescriptor, TableSchema};
use crate::target::{Target, TargetError};
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes one data snapshot to a SQLite database file.
///
/// Owns the connection for its lifetime; dropping the target closes it on
/// every exit path, and [`close`](SqliteTarget::close) surfaces close
/// errors explicitly.
pub struct SqliteTarget {
    path: PathBuf,
    conn: Connection,
}

impl SqliteTarget {
    /// Open a fresh snapshot database at `path`.
    ///
    /// Fails with [`TargetError::SnapshotExists`] if the file is already
    /// there, before anything is opened or written: two snapshots must
    /// never mix in one file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, TargetError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(TargetError::SnapshotExists(path));
        }
        let conn = Connection::open(&path)?;
        Ok(SqliteTarget { path, conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the underlying connection, surfacing any close error.
    pub fn close(self) -> Result<(), TargetError> {
        self.conn.close().map_err(|(_, err)| TargetError::Storage(err))
    }

    fn create_table(&self, table_name: &str, schema: &TableSchema) -> Result<(), TargetError> {
        let columns: Vec<String> = schema.columns().iter().map(column_ddl).collect();
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            table_name,
            columns.join(", ")
        );

        debug!(table = table_name, "creating table");
        self.conn.execute(&ddl, [])?;
        Ok(())
    }

    fn insert_records(
        &mut self,
        table_name: &str,
        schema: &TableSchema,
        records: &[FlatRecord],
    ) -> Result<(), TargetError> {
        let column_list: Vec<String> = schema
            .columns()
            .iter()
            .map(|column| format!("\"{}\"", column.name))
            .collect();
        let placeholders = vec!["?"; column_list.len()].join(", ");
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table_name,
            column_list.join(", "),
            placeholders
        );

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                let row = schema
                    .columns()
                    .iter()
                    .map(|column| bind_value(record.get(&column.original_key)));
                stmt.execute(params_from_iter(row))?;
            }
        }
        tx.commit()?;

        debug!(table = table_name, rows = records.len(), "inserted rows");
        Ok(())
    }
}

impl Target for SqliteTarget {
    fn save(&mut self, data: &BTreeMap<String, Vec<FlatRecord>>) -> Result<(), TargetError> {
        info!(path = %self.path.display(), "saving snapshot");

        for (table_name, records) in data {
            // Types with zero records produce no table at all.
            if records.is_empty() {
                continue;
            }
            if !is_safe_identifier(table_name) {
                return Err(TargetError::InvalidTableName(table_name.clone()));
            }

            let schema = TableSchema::infer(records);
            self.create_table(table_name, &schema)?;
            self.insert_records(table_name, &schema, records)?;
        }
        Ok(())
    }
}

fn column_ddl(column: &ColumnDescriptor) -> String {
    if column.primary_key {
        format!(
            "\"{}\" {} NOT NULL PRIMARY KEY",
            column.name,
            column.column_type.as_sql()
        )
    } else {
        format!("\"{}\" {}", column.name, column.column_type.as_sql())
    }
}

/// Map a flattened JSON leaf to a bound SQL value. Missing keys pad ragged
/// records with NULL. Containers never survive flattening; any that slip
/// through are stored as their JSON text.
fn bind_value(value: Option<&Value>) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        None | Some(Value::Null) => Sql::Null,
        Some(Value::Bool(b)) => Sql::Text(b.to_string()),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Sql::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Sql::Real(f)
            } else {
                Sql::Text(n.to_string())
            }
        }
        Some(Value::String(s)) => Sql::Text(s.clone()),
        Some(other) => Sql::Text(other.to_string()),
    }
}
