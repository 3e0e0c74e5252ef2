//! # Tether
//!
//! Declarative key/value store bindings for reactive view components.
//!
//! Tether keeps views synchronized with keyed entries of a
//! publish/subscribe store. It has two layers:
//!
//! ## Store (keyed publish/subscribe state)
//!
//! - `Store` - in-memory keyed JSON store with `get`/`set`/`merge` and
//!   connect/disconnect subscriptions, passed around as an explicit handle
//! - `ConnectionConfig` - key, optional nested-path projection, and the
//!   delivery callback for one subscription
//!
//! ## Binding (declarative view binding)
//!
//! - `Mapping` / `KeyDescriptor` - which store keys feed which view
//!   properties, including keys templated from the view's own props
//! - `Binding` / `Bound` - the wrapper that owns the subscription
//!   lifecycle: connect on mount, reconnect when prop-derived key fragments
//!   change, hold rendering until all required keys have delivered, and
//!   disconnect on unmount
//!
//! The `client` module tracks active clients of a shared store and answers
//! leadership checks on top of the store's imperative API.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tether::{Binding, FnView, KeyDescriptor, Mapping, Props, Store};
//!
//! let store = Store::new();
//! store.set("item_42", json!({"displayName": "Alice"}));
//!
//! let binding = Binding::new(
//!     store.clone(),
//!     Mapping::new().with(
//!         "name",
//!         KeyDescriptor::new("item_%DATAFROMPROPS%")
//!             .path("displayName")
//!             .path_for_props("itemId"),
//!     ),
//! )
//! .unwrap();
//!
//! let bound = binding.wrap(FnView::new(|props: &Props| {
//!     println!("name is {}", props["name"]);
//! }));
//!
//! let mut props = Props::new();
//! props.insert("itemId".to_owned(), json!("42"));
//! bound.mount(props).unwrap();
//! assert_eq!(bound.resolved_props().unwrap()["name"], json!("Alice"));
//! ```

pub mod binding;
pub mod client;
pub mod store;
pub mod value;

// Re-export main types for convenience
pub use binding::{
    Binding, BindingError, Bound, FnView, KeyDescriptor, Mapping, Props, View, PROPS_PLACEHOLDER,
};
pub use client::{ActiveClients, ACTIVE_CLIENTS};
pub use store::{ConnectionConfig, ConnectionId, Store};
