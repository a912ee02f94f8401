//! Structural equality, pattern matching, and ordering over dynamic values.
//!
//! One recursive equality is shared by `has`/`has_not` filtering and by
//! upsert resolution during knowledge ingestion.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::types::Properties;

/// Deep structural equality.
///
/// Numbers compare by numeric value, so `1` equals `1.0`. Objects compare
/// key-by-key regardless of key order.
pub fn structural_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_eq(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| structural_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| structural_eq(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_eq(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Partial match: every key in `pattern` must be present and deep-equal.
///
/// `field` resolves a key on the candidate. An empty pattern matches anything.
pub fn matches<'a, F>(pattern: &Properties, field: F) -> bool
where
    F: Fn(&str) -> Option<Cow<'a, Value>>,
{
    pattern
        .iter()
        .all(|(key, expected)| field(key).is_some_and(|actual| structural_eq(&actual, expected)))
}

/// Ordering between comparable values: numbers with numbers, strings with
/// strings, booleans with booleans. Anything else is incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
                return Some(a.cmp(&b));
            }
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Properties {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(structural_eq(&json!(1), &json!(1.0)));
        assert!(!structural_eq(&json!(1), &json!(2)));
        assert!(!structural_eq(&json!(1), &json!("1")));
    }

    #[test]
    fn test_nested_structures() {
        let a = json!({"tags": ["x", {"k": 1}], "n": null});
        let b = json!({"n": null, "tags": ["x", {"k": 1.0}]});
        assert!(structural_eq(&a, &b));

        let c = json!({"tags": ["x", {"k": 1}], "n": null, "extra": true});
        assert!(!structural_eq(&a, &c));
        assert!(!structural_eq(&json!([1, 2]), &json!([2, 1])));
    }

    #[test]
    fn test_pattern_requires_every_key() {
        let node = obj(json!({"a": 1, "b": [1, 2]}));
        let lookup = |k: &str| node.get(k).map(Cow::Borrowed);

        assert!(matches(&obj(json!({"a": 1})), lookup));
        assert!(matches(&obj(json!({"a": 1, "b": [1, 2]})), lookup));
        assert!(!matches(&obj(json!({"a": 1, "c": 1})), lookup));
        assert!(!matches(&obj(json!({"b": [1]})), lookup));
        assert!(matches(&Properties::new(), lookup));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(&json!(1), &json!(2.5)), Some(Ordering::Less));
        assert_eq!(compare(&json!(3), &json!(3)), Some(Ordering::Equal));
        assert_eq!(compare(&json!("b"), &json!("a")), Some(Ordering::Greater));
        assert_eq!(compare(&json!(1), &json!("1")), None);
        assert_eq!(compare(&json!(null), &json!(null)), None);
    }
}
