//! Extraction sources feeding the repository
//!
//! A source produces raw nested resources tagged with a logical type name
//! and adds them to a repository; pagination and retries against a real
//! graph-query API belong behind the [`ResourceSource`] seam, not in the
//! core. What ships here are the conventions every source shares (type
//! name normalization, the generic cross-type projection) and a
//! newline-delimited JSON source for driving extraction from a file or
//! stdin.

use crate::flatten::flatten;
use crate::repository::{MemoryRepository, RepositoryError};
use serde_json::{Map, Value};
use std::io::BufRead;
use thiserror::Error;
use tracing::info;

/// Fixed logical type collecting the reduced common field set of every
/// resource regardless of its own type, for cross-type summaries.
pub const GENERIC_RESOURCE_TYPE: &str = "resources";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read resource stream")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON on line {line}")]
    MalformedJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("resource on line {line} is not a JSON object")]
    NotAnObject { line: usize },

    #[error("resource on line {line} has no 'type' field")]
    MissingType { line: usize },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Produces raw nested resources and adds them to a repository.
///
/// A source must call `extract` exactly once per run and is responsible
/// for exhausting its upstream (all pages, all lines) before returning.
pub trait ResourceSource {
    fn extract(&mut self, repository: &mut MemoryRepository) -> Result<(), SourceError>;
}

/// Normalize an upstream resource type into a table-safe logical type
/// name: `Microsoft.Compute/virtualMachines` becomes
/// `microsoft_compute_virtualmachines`.
pub fn normalize_resource_type(resource_type: &str) -> String {
    resource_type
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Project the reduced common field set shared by all resources: id,
/// name, type, location, tags. Location defaults to an empty string and
/// tags to an empty object (which then flattens away).
pub fn generic_resource(resource: &Map<String, Value>) -> Value {
    let mut generic = Map::new();
    for key in ["id", "name", "type"] {
        if let Some(value) = resource.get(key) {
            generic.insert(key.to_string(), value.clone());
        }
    }
    generic.insert(
        "location".to_string(),
        resource
            .get("location")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new())),
    );
    generic.insert(
        "tags".to_string(),
        resource
            .get("tags")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
    );
    Value::Object(generic)
}

/// Reads one JSON resource object per line.
///
/// Every resource must carry a `type` field and is added twice: once
/// under its own normalized type and once under
/// [`GENERIC_RESOURCE_TYPE`] with the reduced common field set. Blank
/// lines are skipped.
pub struct JsonLinesSource<R> {
    reader: R,
    type_prefix: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        JsonLinesSource {
            reader,
            type_prefix: String::new(),
        }
    }

    /// Prefix prepended to every logical type name, generic included
    /// (an Azure source would tag its tables `az_`).
    pub fn with_type_prefix(mut self, prefix: &str) -> Self {
        self.type_prefix = prefix.to_string();
        self
    }
}

impl<R: BufRead> ResourceSource for JsonLinesSource<R> {
    fn extract(&mut self, repository: &mut MemoryRepository) -> Result<(), SourceError> {
        info!("extracting resources from JSON lines stream");
        let generic_type = format!("{}{}", self.type_prefix, GENERIC_RESOURCE_TYPE);
        let mut count = 0usize;

        for (index, line) in self.reader.by_ref().lines().enumerate() {
            let line_number = index + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line).map_err(|source| {
                SourceError::MalformedJson {
                    line: line_number,
                    source,
                }
            })?;
            let resource = value
                .as_object()
                .ok_or(SourceError::NotAnObject { line: line_number })?;
            let resource_type = resource
                .get("type")
                .and_then(Value::as_str)
                .ok_or(SourceError::MissingType { line: line_number })?;

            let logical_type = format!(
                "{}{}",
                self.type_prefix,
                normalize_resource_type(resource_type)
            );
            let generic = flatten(&generic_resource(resource));
            let full = flatten(&value);

            repository.add(&generic_type, generic)?;
            repository.add(&logical_type, full)?;
            count += 1;
        }

        info!(resources = count, "extraction finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_resource_type() {
        assert_eq!(
            normalize_resource_type("Microsoft.Compute/virtualMachines"),
            "microsoft_compute_virtualmachines"
        );
        assert_eq!(normalize_resource_type("resourcecontainers"), "resourcecontainers");
    }

    #[test]
    fn test_generic_resource_defaults() {
        let resource = json!({"id": "r1", "name": "vm", "type": "t"});
        let generic = generic_resource(resource.as_object().unwrap());

        assert_eq!(generic["id"], "r1");
        assert_eq!(generic["location"], "");
        // Default empty tags flatten away entirely.
        let flat = flatten(&generic);
        assert!(!flat.keys().any(|k| k.starts_with("tags")));
    }

    #[test]
    fn test_generic_resource_keeps_tags() {
        let resource = json!({
            "id": "r1", "name": "vm", "type": "t",
            "tags": {"env": "prod"},
            "properties": {"ignored": true}
        });
        let flat = flatten(&generic_resource(resource.as_object().unwrap()));

        assert_eq!(flat["tags_env"], "prod");
        assert!(!flat.contains_key("properties_ignored"));
    }

    #[test]
    fn test_json_lines_extraction() {
        let input = concat!(
            "{\"id\": \"vm-1\", \"name\": \"a\", \"type\": \"Microsoft.Compute/virtualMachines\"}\n",
            "\n",
            "{\"id\": \"sa-1\", \"name\": \"b\", \"type\": \"Microsoft.Storage/storageAccounts\"}\n",
        );

        let mut repository = MemoryRepository::new();
        let mut source = JsonLinesSource::new(input.as_bytes());
        source.extract(&mut repository).unwrap();

        assert_eq!(repository.get_count_by_type(GENERIC_RESOURCE_TYPE), 2);
        assert_eq!(
            repository.get_count_by_type("microsoft_compute_virtualmachines"),
            1
        );
        assert_eq!(
            repository.get_count_by_type("microsoft_storage_storageaccounts"),
            1
        );
    }

    #[test]
    fn test_type_prefix_applies_to_all_tables() {
        let input = "{\"id\": \"vm-1\", \"name\": \"a\", \"type\": \"X/Y\"}\n";

        let mut repository = MemoryRepository::new();
        let mut source = JsonLinesSource::new(input.as_bytes()).with_type_prefix("az_");
        source.extract(&mut repository).unwrap();

        assert_eq!(repository.get_count_by_type("az_resources"), 1);
        assert_eq!(repository.get_count_by_type("az_x_y"), 1);
    }

    #[test]
    fn test_missing_type_field_fails_with_line() {
        let input = "{\"id\": \"vm-1\"}\n";

        let mut repository = MemoryRepository::new();
        let mut source = JsonLinesSource::new(input.as_bytes());
        let result = source.extract(&mut repository);

        assert!(matches!(result, Err(SourceError::MissingType { line: 1 })));
    }

    #[test]
    fn test_malformed_json_fails_with_line() {
        let input = "{\"id\": \"vm-1\", \"type\": \"t\"}\nnot json\n";

        let mut repository = MemoryRepository::new();
        let mut source = JsonLinesSource::new(input.as_bytes());
        let result = source.extract(&mut repository);

        assert!(matches!(result, Err(SourceError::MalformedJson { line: 2, .. })));
    }
}
