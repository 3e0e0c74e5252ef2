use serde_json::{Map, Value};

/// Resolve a dot-separated property path against a value.
///
/// Each segment descends one level: object segments are looked up by key,
/// array segments by numeric index. Returns `None` as soon as a segment
/// fails to resolve.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tether::value::resolve;
///
/// let value = json!({"report": {"participants": ["alice", "bob"]}});
/// assert_eq!(resolve(&value, "report.participants.1"), Some(&json!("bob")));
/// assert_eq!(resolve(&value, "report.missing"), None);
/// ```
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(fields) => fields.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a dot-separated property path against a JSON object.
///
/// Same traversal as [`resolve`], starting from a bare object map. Used to
/// read prop-derived values without wrapping the props in a `Value` first.
pub fn resolve_in_object<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => object.get(path),
        Some((head, rest)) => resolve(object.get(head)?, rest),
    }
}
