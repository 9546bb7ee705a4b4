//! Persistence targets for extracted snapshots
//!
//! A target consumes the repository's full contents and materializes one
//! table per logical type. Storage errors are propagated to the caller,
//! never swallowed.

pub mod sqlite;

pub use sqlite::SqliteTarget;

use crate::flatten::FlatRecord;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    /// The destination snapshot file already exists. A snapshot file holds
    /// exactly one extraction run, so this fails before any write occurs.
    #[error("snapshot file {0} already exists, use a different path to avoid mixing snapshots")]
    SnapshotExists(PathBuf),

    /// A logical type name failed the identifier allow-list check and
    /// cannot be used as a table name.
    #[error("'{0}' is not a valid table name")]
    InvalidTableName(String),

    /// Propagated storage-layer failure: constraint violation, disk error,
    /// duplicate primary key.
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
}

/// A sink for the full extraction result, keyed by logical type.
pub trait Target {
    fn save(&mut self, data: &BTreeMap<String, Vec<FlatRecord>>) -> Result<(), TargetError>;
}
