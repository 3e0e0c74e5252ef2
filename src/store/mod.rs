//! Keyed publish/subscribe state store.
//!
//! The store holds JSON values under string keys and delivers every change to
//! the subscriptions connected to that key. It is the data source the binding
//! layer subscribes to, and it is passed around as an explicit handle so
//! application code and tests can construct their own instances instead of
//! reaching for a process-wide singleton.

mod store;

pub use store::{ConnectionConfig, ConnectionId, Store};
