use thiserror::Error;

/// Errors surfaced by mapping validation and bound-component lifecycle calls.
///
/// Configuration problems are reported eagerly by [`Binding::new`]; prop
/// resolution problems are reported by `mount`/`update` before any
/// subscription is touched. Store operations themselves do not fail.
///
/// [`Binding::new`]: crate::binding::Binding::new
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A descriptor was declared with an empty key template.
    #[error("descriptor for `{property}` has an empty key")]
    EmptyKey { property: String },

    /// A key template contains the placeholder token but the descriptor has
    /// no `path_for_props` to substitute from.
    #[error("descriptor for `{property}` templates its key from props but declares no `path_for_props`")]
    MissingPropsPath { property: String },

    /// The mapping declares the same view property twice.
    #[error("mapping declares `{property}` more than once")]
    DuplicateProperty { property: String },

    /// The `path_for_props` path did not resolve to a scalar in the current
    /// props, so the key template cannot be expanded.
    #[error("props value at `{path}` for `{property}` is missing or not a scalar")]
    PropValueMissing { property: String, path: String },

    /// `mount` was called on a component that is already mounted.
    #[error("component is already mounted")]
    AlreadyMounted,

    /// `update` was called on a component that is not mounted.
    #[error("component is not mounted")]
    NotMounted,
}
