//! Sparse serialization and `?fields=` projection.
//!
//! API output omits fields holding null, the empty string or an empty list;
//! on top of that, clients may project records down to an explicit field
//! subset. Both operate on the serialized JSON so every resource shares one
//! implementation.

use crate::error::Result;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Strip empty fields from objects, recursing through nested records.
pub fn sparse(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(sparse),
        Value::Object(map) => {
            map.retain(|_, v| !is_empty_value(v));
            map.values_mut().for_each(sparse);
        }
        _ => {}
    }
}

/// Keep only the requested keys on each record. Unknown names simply do not
/// match anything.
pub fn project(value: &mut Value, fields: &HashSet<String>) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(|v| project(v, fields)),
        Value::Object(map) => map.retain(|k, _| fields.contains(k)),
        _ => {}
    }
}

pub fn parse_fields(raw: &Option<String>) -> Option<HashSet<String>> {
    raw.as_ref().map(|s| {
        s.split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect()
    })
}

/// Serialize with the sparse rule and an optional `fields` projection.
pub fn render<T: Serialize>(data: &T, fields: &Option<String>) -> Result<Value> {
    let mut value = serde_json::to_value(data)?;
    sparse(&mut value);
    if let Some(fields) = parse_fields(fields) {
        project(&mut value, &fields);
    }
    Ok(value)
}

pub fn json_body<T: Serialize>(data: &T, fields: &Option<String>) -> Result<Json<Value>> {
    Ok(Json(render(data, fields)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_drops_null_empty_string_and_empty_list() {
        let mut value = json!([
            { "code": "AAPOS", "name": null, "tags": [], "state": "", "category": "A" }
        ]);
        sparse(&mut value);
        assert_eq!(value, json!([{ "code": "AAPOS", "category": "A" }]));
    }

    #[test]
    fn sparse_recurses_into_children() {
        let mut value = json!({
            "sarh_id": "S-1",
            "tecnical_sub": [ { "year": 2016, "aforo": null } ]
        });
        sparse(&mut value);
        assert_eq!(value, json!({ "sarh_id": "S-1", "tecnical_sub": [{ "year": 2016 }] }));
    }

    #[test]
    fn projection_keeps_requested_fields_only() {
        let mut value = json!([
            { "code": "AAPOS", "name": "AAPOS", "category": "A" },
            { "code": "EPSAS", "name": "EPSAS", "category": "A" }
        ]);
        let fields = parse_fields(&Some("code,category".to_string())).unwrap();
        project(&mut value, &fields);
        assert_eq!(
            value,
            json!([
                { "code": "AAPOS", "category": "A" },
                { "code": "EPSAS", "category": "A" }
            ])
        );
    }

    #[test]
    fn unknown_projection_names_are_ignored() {
        let mut value = json!({ "code": "AAPOS" });
        let fields = parse_fields(&Some("code,nope".to_string())).unwrap();
        project(&mut value, &fields);
        assert_eq!(value, json!({ "code": "AAPOS" }));
    }
}
