use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::db::models::is_meta_field;

/// Compute the names of the fields an update changes.
///
/// Every top-level key of `updates` whose value is missing from or different
/// to `original` is reported. When the updated value is an object, each
/// sub-key present on either side whose values differ is also reported as
/// `key.sub`. Recursion stops there: deeper differences surface only as
/// `key.sub`.
pub fn updated_fields(updates: &Map<String, Value>, original: &Map<String, Value>) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();

    for (key, value) in updates {
        if is_meta_field(key) {
            continue;
        }
        let previous = original.get(key);
        if previous == Some(value) {
            continue;
        }
        fields.insert(key.clone());

        if let Value::Object(nested) = value {
            let empty = Map::new();
            let previous = match previous {
                Some(Value::Object(previous)) => previous,
                _ => &empty,
            };
            for sub in nested.keys().chain(previous.keys()) {
                if nested.get(sub) != previous.get(sub) {
                    fields.insert(format!("{key}.{sub}"));
                }
            }
        }
    }

    fields
}
