use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::store::Store;

/// Store key under which the active-client record lives.
pub const ACTIVE_CLIENTS: &str = "activeClients";

/// This client's entry in the shared active-client record.
///
/// Registration merges `{"clientID": <uuid>}` into [`ACTIVE_CLIENTS`], so
/// the record always names the most recent registrant; that client is the
/// leader. Other modules can subscribe to the same key to react when
/// leadership moves.
///
/// # Examples
///
/// ```
/// use tether::client::ActiveClients;
/// use tether::store::Store;
///
/// let store = Store::new();
/// let first = ActiveClients::register(store.clone());
/// assert!(first.is_leader());
///
/// let second = ActiveClients::register(store);
/// assert!(second.is_leader());
/// assert!(!first.is_leader());
/// ```
pub struct ActiveClients {
    store: Store,
    client_id: String,
}

impl ActiveClients {
    /// Generate a fresh client id and add it to the active-client record.
    pub fn register(store: Store) -> Self {
        let client_id = Uuid::new_v4().to_string();
        store.merge(ACTIVE_CLIENTS, json!({ "clientID": client_id }));
        debug!(%client_id, "registered active client");
        Self { store, client_id }
    }

    /// The generated id for this client.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Remove this client from the record when it exits. If another client
    /// has registered since, the record is left untouched.
    pub fn remove(&self) {
        let mut record = self
            .store
            .get(ACTIVE_CLIENTS)
            .unwrap_or_else(|| json!({}));
        if let Value::Object(fields) = &mut record {
            if fields.get("clientID").and_then(Value::as_str) == Some(self.client_id.as_str()) {
                fields.remove("clientID");
                debug!(client_id = %self.client_id, "removed active client");
            }
        }
        self.store.set(ACTIVE_CLIENTS, record);
    }

    /// Whether this client is the leader. The most recent registrant wins.
    pub fn is_leader(&self) -> bool {
        self.store
            .get(ACTIVE_CLIENTS)
            .as_ref()
            .and_then(|record| crate::value::resolve(record, "clientID"))
            .and_then(Value::as_str)
            .map_or(false, |id| id == self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_registrant_leads() {
        let store = Store::new();
        let first = ActiveClients::register(store.clone());
        assert!(first.is_leader());

        let second = ActiveClients::register(store.clone());
        assert!(second.is_leader());
        assert!(!first.is_leader());
    }

    #[test]
    fn remove_clears_own_registration_only() {
        let store = Store::new();
        let first = ActiveClients::register(store.clone());
        let second = ActiveClients::register(store.clone());

        // First client exiting must not clobber the current leader.
        first.remove();
        assert!(second.is_leader());

        second.remove();
        assert!(!second.is_leader());
        assert_eq!(store.get(ACTIVE_CLIENTS), Some(json!({})));
    }

    #[test]
    fn client_ids_are_unique() {
        let store = Store::new();
        let first = ActiveClients::register(store.clone());
        let second = ActiveClients::register(store);
        assert_ne!(first.client_id(), second.client_id());
    }
}
