//! Filter and projection semantics shared by every store backend.
//!
//! The subset implemented here is what the pipeline needs: conjunctions of
//! equality predicates (dotted keys address nested fields, array fields match
//! on any element) and MongoDB-style inclusion/exclusion projections.
//! Operator objects such as `{"$gt": 3}` are rejected instead of being
//! silently treated as literal values.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::models::{Document, Record};

const ID_FIELD: &str = "_id";

/// Returns whether `record` satisfies every predicate in `filter`.
///
/// An empty filter matches everything.
pub fn matches_filter(record: &Record, filter: &Document) -> Result<bool> {
    for (key, expected) in filter {
        if key.starts_with('$') {
            bail!("unsupported filter operator: {}", key);
        }
        if let Value::Object(obj) = expected {
            if let Some(op) = obj.keys().find(|k| k.starts_with('$')) {
                bail!("unsupported filter operator '{}' on field '{}'", op, key);
            }
        }
        let actual = lookup_path(record, key);
        if !field_matches(actual, expected) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Type-tagged key for an `_id` value, or `None` if it cannot identify a document.
///
/// Numbers are keyed by their `f64` value so `1` and `1.0` agree with
/// [`matches_filter`]; strings and numbers never share a key.
pub fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(format!("s:{}", s)),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) => format!("n:{}", f),
            None => format!("n:{}", n),
        }),
        _ => None,
    }
}

/// Resolves a dotted path (`"address.city"`) inside a record.
pub fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = record.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn field_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), e) if !e.is_array() => {
            items.iter().any(|item| values_equal(item, e))
        }
        (Some(a), e) => values_equal(a, e),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Applies a projection to a record.
///
/// - empty projection → the record unchanged
/// - inclusion (`1`/`true`) → only the listed fields, plus `_id` unless `_id: 0`
/// - exclusion (`0`/`false`) → the record minus the listed fields
///
/// Mixing inclusion and exclusion (other than for `_id`) is an error.
pub fn apply_projection(record: &Record, projection: &Document) -> Result<Record> {
    if projection.is_empty() {
        return Ok(record.clone());
    }

    let mut include_id = true;
    let mut included: Vec<&str> = Vec::new();
    let mut excluded: Vec<&str> = Vec::new();

    for (key, flag) in projection {
        let on = projection_flag(key, flag)?;
        if key == ID_FIELD {
            include_id = on;
        } else if on {
            included.push(key);
        } else {
            excluded.push(key);
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        bail!("projection cannot mix inclusion and exclusion");
    }

    if included.is_empty() {
        let mut out = record.clone();
        for path in excluded {
            remove_path(&mut out, path);
        }
        if !include_id {
            out.remove(ID_FIELD);
        }
        return Ok(out);
    }

    let mut out = Document::new();
    if include_id {
        if let Some(id) = record.get(ID_FIELD) {
            out.insert(ID_FIELD.to_string(), id.clone());
        }
    }
    for path in included {
        if let Some(value) = lookup_path(record, path) {
            insert_path(&mut out, path, value.clone());
        }
    }
    Ok(out)
}

fn projection_flag(key: &str, flag: &Value) -> Result<bool> {
    match flag {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        other => bail!("unsupported projection value for '{}': {}", key, other),
    }
}

fn insert_path(target: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !entry.is_object() {
                *entry = Value::Object(Document::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

fn remove_path(target: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            target.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = target.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_id_key_is_type_tagged() {
        assert_eq!(id_key(&json!("1")).unwrap(), "s:1");
        assert_eq!(id_key(&json!(1)).unwrap(), "n:1");
        assert_ne!(id_key(&json!(1)), id_key(&json!("1")));
        assert_eq!(id_key(&json!(1)), id_key(&json!(1.0)));
        assert!(id_key(&json!("")).is_none());
        assert!(id_key(&json!(null)).is_none());
        assert!(id_key(&json!({"$oid": "x"})).is_none());
    }

    #[test]
    fn test_empty_filter_matches() {
        let r = doc(json!({"a": 1}));
        assert!(matches_filter(&r, &Document::new()).unwrap());
    }

    #[test]
    fn test_equality_and_conjunction() {
        let r = doc(json!({"project_id": "p1", "status": "done"}));
        assert!(matches_filter(&r, &doc(json!({"project_id": "p1"}))).unwrap());
        assert!(!matches_filter(&r, &doc(json!({"project_id": "p2"}))).unwrap());
        assert!(!matches_filter(&r, &doc(json!({"project_id": "p1", "status": "open"}))).unwrap());
    }

    #[test]
    fn test_numeric_equality_ignores_representation() {
        let r = doc(json!({"target": 10}));
        assert!(matches_filter(&r, &doc(json!({"target": 10.0}))).unwrap());
    }

    #[test]
    fn test_dotted_path_and_array_membership() {
        let r = doc(json!({"meta": {"owner": "u1"}, "states": ["Kerala", "Goa"]}));
        assert!(matches_filter(&r, &doc(json!({"meta.owner": "u1"}))).unwrap());
        assert!(matches_filter(&r, &doc(json!({"states": "Goa"}))).unwrap());
        assert!(!matches_filter(&r, &doc(json!({"states": "Bihar"}))).unwrap());
    }

    #[test]
    fn test_null_matches_missing_field() {
        let r = doc(json!({"a": 1}));
        assert!(matches_filter(&r, &doc(json!({"b": null}))).unwrap());
    }

    #[test]
    fn test_operators_are_rejected() {
        let r = doc(json!({"a": 1}));
        assert!(matches_filter(&r, &doc(json!({"a": {"$gt": 0}}))).is_err());
        assert!(matches_filter(&r, &doc(json!({"$or": []}))).is_err());
    }

    #[test]
    fn test_inclusion_projection_keeps_id() {
        let r = doc(json!({"_id": "k1", "indicator": "Wells", "target": 5}));
        let out = apply_projection(&r, &doc(json!({"indicator": 1}))).unwrap();
        assert_eq!(Value::Object(out), json!({"_id": "k1", "indicator": "Wells"}));
    }

    #[test]
    fn test_inclusion_projection_can_drop_id() {
        let r = doc(json!({"_id": "k1", "indicator": "Wells"}));
        let out = apply_projection(&r, &doc(json!({"indicator": true, "_id": 0}))).unwrap();
        assert_eq!(Value::Object(out), json!({"indicator": "Wells"}));
    }

    #[test]
    fn test_exclusion_projection() {
        let r = doc(json!({"_id": "k1", "indicator": "Wells", "target": 5, "meta": {"x": 1, "y": 2}}));
        let out = apply_projection(&r, &doc(json!({"target": 0, "meta.x": 0}))).unwrap();
        assert_eq!(
            Value::Object(out),
            json!({"_id": "k1", "indicator": "Wells", "meta": {"y": 2}})
        );
    }

    #[test]
    fn test_nested_inclusion_projection() {
        let r = doc(json!({"_id": "p", "address": {"city": "Pune", "zip": "411001"}}));
        let out = apply_projection(&r, &doc(json!({"address.city": 1}))).unwrap();
        assert_eq!(Value::Object(out), json!({"_id": "p", "address": {"city": "Pune"}}));
    }

    #[test]
    fn test_mixed_projection_is_rejected() {
        let r = doc(json!({"a": 1, "b": 2}));
        assert!(apply_projection(&r, &doc(json!({"a": 1, "b": 0}))).is_err());
        assert!(apply_projection(&r, &doc(json!({"a": "yes"}))).is_err());
    }
}
