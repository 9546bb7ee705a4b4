//! JSON flattening - collapse nested structures into single-level records
//!
//! Raw resources arrive as arbitrarily nested JSON. Before they can become
//! table rows, each one is flattened into a single-level mapping from a
//! composite key path to a scalar leaf value: object keys and array indices
//! are joined with `_`, so `{"properties": {"disks": [{"lun": 0}]}}` yields
//! the key `properties_disks_0_lun`.

use serde_json::{Map, Value};

/// Separator joining nested key path segments.
pub const KEY_SEPARATOR: char = '_';

/// A flattened resource: single-level keys to scalar leaf values.
pub type FlatRecord = Map<String, Value>;

/// Flatten an arbitrarily nested JSON value into a single-level record.
///
/// Scalars (numbers, strings, booleans, null) are kept unchanged under
/// their joined key path. Distinct leaf paths stay distinct as long as
/// keys do not themselves embed the separator: a literal `a_b` key and a
/// nested `a` / `b` path collapse to the same flattened key, last write
/// winning. Empty objects and arrays contribute no keys at all - callers
/// must not rely on empty containers surviving.
pub fn flatten(value: &Value) -> FlatRecord {
    let mut out = Map::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, path: String, out: &mut FlatRecord) {
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                flatten_into(child, format!("{}{}{}", path, key, KEY_SEPARATOR), out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, format!("{}{}{}", path, index, KEY_SEPARATOR), out);
            }
        }
        scalar => {
            let key = path.strip_suffix(KEY_SEPARATOR).unwrap_or(&path);
            out.insert(key.to_string(), scalar.clone());
        }
    }
}
