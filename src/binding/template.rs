use serde_json::Value;

/// Placeholder token in a key template, replaced with a prop-derived value
/// when the subscription is opened.
pub const PROPS_PLACEHOLDER: &str = "%DATAFROMPROPS%";

/// Whether a key template contains the placeholder token.
pub fn has_placeholder(template: &str) -> bool {
    template.contains(PROPS_PLACEHOLDER)
}

/// Expand a key template, replacing every occurrence of the placeholder
/// with `value`.
///
/// # Examples
///
/// ```
/// use tether::binding::expand;
///
/// assert_eq!(expand("report_%DATAFROMPROPS%", "22"), "report_22");
/// assert_eq!(expand("session", "22"), "session");
/// ```
pub fn expand(template: &str, value: &str) -> String {
    template.replace(PROPS_PLACEHOLDER, value)
}

/// Render a prop value as placeholder text. Only scalars make sense inside
/// a key; objects, arrays and null yield `None`.
pub(crate) fn placeholder_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
