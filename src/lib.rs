//! # Quarry - cloud resource snapshotting
//!
//! A library for discovering heterogeneous, nested JSON resources,
//! flattening them, and persisting them as relational tables in a SQLite
//! snapshot file whose schema is inferred from the records themselves.
//!
//! ## Modules
//!
//! - **flatten**: collapse nested JSON into single-level records
//! - **repository**: in-memory accumulator for one extraction run
//! - **schema**: per-table column set and type inference
//! - **target**: persistence targets (SQLite snapshot files)
//! - **source**: extraction sources feeding the repository
//! - **snapshot**: read-only introspection of finished snapshots
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry::flatten::flatten;
//! use quarry::repository::MemoryRepository;
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let resource = json!({
//!     "id": "vm-1",
//!     "name": "worker",
//!     "properties": {"size": "D2", "disks": [{"lun": 0}]}
//! });
//!
//! let mut repository = MemoryRepository::new();
//! repository.add("virtual_machines", flatten(&resource))?;
//!
//! assert_eq!(repository.get_count_by_type("virtual_machines"), 1);
//! let record = &repository.get_all_by_type("virtual_machines")[0];
//! assert_eq!(record["properties_disks_0_lun"], 0);
//! # Ok(())
//! # }
//! ```
//!
//! Persisting the run creates one table per logical type, each with a
//! primary key taken from the reserved `id` field:
//!
//! ```rust,no_run
//! # use quarry::repository::MemoryRepository;
//! use quarry::target::SqliteTarget;
//!
//! # fn main() -> anyhow::Result<()> {
//! # let repository = MemoryRepository::new();
//! let mut target = SqliteTarget::create("extract_20260826120000.db")?;
//! repository.save_to(&mut target)?;
//! target.close()?;
//! # Ok(())
//! # }
//! ```

pub mod flatten;
pub mod repository;
pub mod schema;
pub mod snapshot;
pub mod source;
pub mod target;

// Re-export commonly used types for convenience
pub use flatten::{flatten, FlatRecord};
pub use repository::{MemoryRepository, RepositoryError, SYSTEM_UNIQUE_ID_KEY};
pub use schema::{ColumnDescriptor, ColumnType, TableSchema};
pub use source::{JsonLinesSource, ResourceSource, SourceError};
pub use target::{SqliteTarget, Target, TargetError};
