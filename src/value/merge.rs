use serde_json::Value;

/// Recursively merge `partial` into `base`.
///
/// Objects merge field by field; any other pairing replaces the base value
/// outright. This mirrors the merge contract of [`Store::merge`]: partial
/// records accumulate, while scalars and arrays are last-write-wins.
///
/// [`Store::merge`]: crate::store::Store::merge
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tether::value::deep_merge;
///
/// let mut base = json!({"user": {"name": "alice", "age": 30}});
/// deep_merge(&mut base, json!({"user": {"age": 31}, "online": true}));
/// assert_eq!(base, json!({"user": {"name": "alice", "age": 31}, "online": true}));
/// ```
pub fn deep_merge(base: &mut Value, partial: Value) {
    match (base, partial) {
        (Value::Object(base_fields), Value::Object(partial_fields)) => {
            for (key, value) in partial_fields {
                match base_fields.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_fields.insert(key, value);
                    }
                }
            }
        }
        (base, partial) => *base = partial,
    }
}
