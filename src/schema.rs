//! Relational schema inference over flattened records
//!
//! Tables have no predefined schema: column names, types, and the primary
//! key are derived from the record set itself each time a table is written.
//! Inference is a deterministic left-fold over the records in order, kept
//! independent of any storage backend so the widening rule stays a pure,
//! testable function.

use crate::flatten::FlatRecord;
use crate::repository::SYSTEM_UNIQUE_ID_KEY;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Allow-list for names that get interpolated into SQL: identifiers cannot
/// be bound as query parameters, so anything outside this set is rejected.
static SAFE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").unwrap());

/// Check a table or column name against the identifier allow-list.
pub fn is_safe_identifier(name: &str) -> bool {
    SAFE_IDENTIFIER.is_match(name)
}

/// Normalize a record key into a column name: ASCII-lowercased, with every
/// character that is not an ASCII letter or digit replaced by `_`.
pub fn normalize_column_name(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// SQL storage class inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// Initial type assigned by the first value observed for a column.
    /// Anything that is not a number (strings, booleans, nulls) starts as
    /// TEXT.
    fn of(value: &Value) -> ColumnType {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
            Value::Number(_) => ColumnType::Real,
            _ => ColumnType::Text,
        }
    }

    /// Widen this type to accommodate a later value for the same column.
    ///
    /// Widening is monotonic toward TEXT: a non-numeric value forces TEXT
    /// and nothing ever narrows back. A float arriving in an INTEGER
    /// column widens it to REAL so fractional values are not truncated.
    fn widen(self, value: &Value) -> ColumnType {
        match (self, value) {
            (ColumnType::Text, _) => ColumnType::Text,
            (current, Value::Number(_)) => {
                if current == ColumnType::Integer && ColumnType::of(value) == ColumnType::Real {
                    ColumnType::Real
                } else {
                    current
                }
            }
            _ => ColumnType::Text,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// One inferred column: the normalized name used in SQL, the original
/// record key values are read from, the inferred type, and whether this
/// column is the table's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub original_key: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
}

/// The inferred schema for one table.
///
/// Columns are kept in first-seen order across the full record scan; the
/// same ordered sequence drives both the generated DDL and the insert
/// column list, so positional value tuples always line up.
///
/// When two distinct original keys normalize to the same column name
/// (`key.1` and `key-1` both become `key_1`) they merge into one column
/// and the last-seen original key wins. This is lossy by design: one of
/// the fields loses its distinct identity in the output. The one
/// exception is the primary-key column, which always keeps reading the
/// reserved id field regardless of later colliding keys.
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    columns: Vec<ColumnDescriptor>,
    by_name: HashMap<String, usize>,
}

impl TableSchema {
    /// Infer a schema from all records destined for one table.
    ///
    /// Idempotent: the same record sequence always yields identical column
    /// definitions in identical order.
    pub fn infer(records: &[FlatRecord]) -> TableSchema {
        let mut schema = TableSchema::default();
        for record in records {
            for (key, value) in record {
                schema.observe(key, value);
            }
        }
        schema
    }

    fn observe(&mut self, key: &str, value: &Value) {
        let name = normalize_column_name(key);
        match self.by_name.get(&name) {
            Some(&index) => {
                let column = &mut self.columns[index];
                column.column_type = column.column_type.widen(value);
                // Normalization collisions merge here: last-seen key wins,
                // except that the primary-key column keeps reading the
                // reserved id field so a colliding key cannot shadow it.
                if !column.primary_key {
                    column.original_key = key.to_string();
                }
                column.primary_key |= key == SYSTEM_UNIQUE_ID_KEY;
            }
            None => {
                self.by_name.insert(name.clone(), self.columns.len());
                self.columns.push(ColumnDescriptor {
                    name,
                    original_key: key.to_string(),
                    column_type: ColumnType::of(value),
                    primary_key: key == SYSTEM_UNIQUE_ID_KEY,
                });
            }
        }
    }

    /// Columns in first-seen order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
