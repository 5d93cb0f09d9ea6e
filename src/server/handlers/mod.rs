//! REST handlers, one module per registry family.

pub mod catalog;
pub mod epsas;
pub mod planning;
pub mod reports;
pub mod sarhs;
pub mod supply_areas;

use crate::error::{ApiError, Result};
use serde_json::Value;

/// A POST body is either one record or a list of records.
pub(crate) enum Payload {
    Single(Value),
    Bulk(Vec<Value>),
}

pub(crate) fn split_payload(body: Value) -> Payload {
    match body {
        Value::Array(items) => Payload::Bulk(items),
        other => Payload::Single(other),
    }
}

/// Object-level PATCH merge: keys in the patch replace the stored ones,
/// everything else is preserved. The merged record is re-validated as a
/// whole before it is written.
pub(crate) fn merge_patch(existing: Value, patch: &Value) -> Result<Value> {
    let mut base = match existing {
        Value::Object(map) => map,
        _ => return Err(ApiError::Validation(vec!["stored record is not an object".to_string()])),
    };
    let patch_obj = patch
        .as_object()
        .ok_or_else(|| ApiError::Validation(vec!["PATCH body must be a JSON object".to_string()]))?;
    for (key, value) in patch_obj {
        base.insert(key.clone(), value.clone());
    }
    Ok(Value::Object(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_merge_replaces_only_provided_keys() {
        let existing = json!({ "code": "AAPOS", "name": "old", "category": "A" });
        let merged = merge_patch(existing, &json!({ "name": "new" })).unwrap();
        assert_eq!(merged, json!({ "code": "AAPOS", "name": "new", "category": "A" }));
    }

    #[test]
    fn patch_merge_rejects_non_object_body() {
        assert!(merge_patch(json!({}), &json!([1, 2])).is_err());
    }
}
