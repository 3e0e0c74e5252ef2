use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::BindingError;
use super::template;

/// Describes one store subscription and its projection into a view property.
///
/// The `key` is a template for the store key and may contain
/// [`PROPS_PLACEHOLDER`](super::PROPS_PLACEHOLDER), in which case
/// `path_for_props` names the props field the substitution value is read
/// from. An optional `path` projects a nested field of the stored value onto
/// the view property instead of the whole value. Descriptors with
/// `init_with_stored_values` set to `false` do not gate the initial render
/// and are not prefilled from the store.
///
/// Descriptors serialize with their original camelCase field names so
/// mappings can be declared in JSON configuration:
///
/// ```
/// use tether::binding::KeyDescriptor;
///
/// let descriptor: KeyDescriptor = serde_json::from_str(
///     r#"{"key": "report_%DATAFROMPROPS%", "pathForProps": "reportID"}"#,
/// ).unwrap();
/// assert_eq!(descriptor.path_for_props.as_deref(), Some("reportID"));
/// assert!(descriptor.init_with_stored_values);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyDescriptor {
    /// Store key template.
    pub key: String,
    /// Props path supplying the placeholder substitution value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_for_props: Option<String>,
    /// Nested field of the stored value to project onto the view property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Whether this key gates the initial render.
    pub init_with_stored_values: bool,
}

impl Default for KeyDescriptor {
    fn default() -> Self {
        Self {
            key: String::new(),
            path_for_props: None,
            path: None,
            init_with_stored_values: true,
        }
    }
}

impl KeyDescriptor {
    /// Describe a subscription to `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Project this nested field of the stored value onto the view property.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Read the placeholder substitution value from this props path.
    pub fn path_for_props(mut self, path: impl Into<String>) -> Self {
        self.path_for_props = Some(path.into());
        self
    }

    /// Control whether this key gates the initial render and is prefilled
    /// from the store.
    pub fn init_with_stored_values(mut self, init: bool) -> Self {
        self.init_with_stored_values = init;
        self
    }

    fn validate(&self, property: &str) -> Result<(), BindingError> {
        if self.key.is_empty() {
            return Err(BindingError::EmptyKey {
                property: property.to_owned(),
            });
        }
        if template::has_placeholder(&self.key) && self.path_for_props.is_none() {
            return Err(BindingError::MissingPropsPath {
                property: property.to_owned(),
            });
        }
        Ok(())
    }
}

/// Ordered collection of view-property name to [`KeyDescriptor`] pairs.
///
/// A mapping is built once, validated by [`Binding::new`], and is immutable
/// for the lifetime of the binding. Declaration order is preserved so
/// subscriptions open in a predictable order.
///
/// [`Binding::new`]: super::Binding::new
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping {
    entries: IndexMap<String, KeyDescriptor>,
    #[serde(skip)]
    duplicate: Option<String>,
}

impl Mapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Declaring the same property twice is rejected when the
    /// mapping is validated.
    pub fn with(mut self, property: impl Into<String>, descriptor: KeyDescriptor) -> Self {
        let property = property.into();
        if self
            .entries
            .insert(property.clone(), descriptor)
            .is_some()
            && self.duplicate.is_none()
        {
            self.duplicate = Some(property);
        }
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyDescriptor)> {
        self.entries
            .iter()
            .map(|(property, descriptor)| (property.as_str(), descriptor))
    }

    /// Look up a descriptor by view property name.
    pub fn get(&self, property: &str) -> Option<&KeyDescriptor> {
        self.entries.get(property)
    }

    pub(crate) fn validate(&self) -> Result<(), BindingError> {
        if let Some(property) = &self.duplicate {
            return Err(BindingError::DuplicateProperty {
                property: property.clone(),
            });
        }
        for (property, descriptor) in self.iter() {
            descriptor.validate(property)?;
        }
        Ok(())
    }

    /// Properties that must receive a delivery before the loading gate opens.
    pub(crate) fn required_for_init(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, descriptor)| descriptor.init_with_stored_values)
            .map(|(property, _)| property.as_str())
    }
}
