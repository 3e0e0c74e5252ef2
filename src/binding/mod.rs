//! Declarative store-to-view binding.
//!
//! A [`Mapping`] declares which store keys feed which view properties; a
//! [`Binding`] validates that mapping against a store once; and the
//! [`Bound`] components it stamps out manage the whole subscription
//! lifecycle for a view: connect on mount, re-template and reconnect when
//! prop-derived key fragments change, hold rendering until every required
//! key has delivered, and disconnect on unmount.

mod bound;
mod descriptor;
mod error;
mod template;
mod view;

pub use bound::{Binding, Bound};
pub use descriptor::{KeyDescriptor, Mapping};
pub use error::BindingError;
pub use template::{expand, has_placeholder, PROPS_PLACEHOLDER};
pub use view::{FnView, Props, View};
