//! JSON value utilities shared by the store and the binding layer.
//!
//! This module provides the two small operations the rest of the crate keeps
//! reaching for: dot-separated property-path lookup (used to project stored
//! values onto view properties and to read placeholder values out of props)
//! and the recursive merge backing [`Store::merge`](crate::store::Store::merge).

mod merge;
mod path;

pub use merge::deep_merge;
pub use path::{resolve, resolve_in_object};
