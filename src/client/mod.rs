//! Active-client registry.
//!
//! Tracks which clients of a shared store are currently running, using the
//! store's own imperative API, and answers leadership checks so that work
//! meant to happen once (queue flushing, cross-tab coordination) can be
//! claimed by a single client.

mod clients;

pub use clients::{ActiveClients, ACTIVE_CLIENTS};
