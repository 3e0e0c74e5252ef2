use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::trace;

use crate::value::{deep_merge, resolve};

type ChangeCallback = dyn Fn(Option<Value>) + Send + Sync;

/// Opaque handle to an open subscription, used to disconnect it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// Describes one subscription: the key to watch, an optional nested path to
/// project delivered values through, and the callback to deliver to.
///
/// With `init_with_stored_values` left at its default of `true`, connecting
/// to a key that already holds a value delivers that value immediately.
/// Setting it to `false` suppresses the initial delivery, so the callback
/// only sees changes made after the connection was opened.
pub struct ConnectionConfig {
    key: String,
    path: Option<String>,
    init_with_stored_values: bool,
    callback: Arc<ChangeCallback>,
}

impl ConnectionConfig {
    /// Subscribe `callback` to changes of `key`.
    pub fn new(
        key: impl Into<String>,
        callback: impl Fn(Option<Value>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            path: None,
            init_with_stored_values: true,
            callback: Arc::new(callback),
        }
    }

    /// Project delivered values through a dot-separated property path.
    ///
    /// When the path does not resolve within the stored value, the callback
    /// receives `None` as an explicit "no value" delivery.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Control whether the currently stored value is delivered on connect.
    pub fn init_with_stored_values(mut self, init: bool) -> Self {
        self.init_with_stored_values = init;
        self
    }
}

struct Subscription {
    key: String,
    path: Option<String>,
    callback: Arc<ChangeCallback>,
}

#[derive(Default)]
struct StoreInner {
    data: HashMap<String, Value>,
    subscriptions: HashMap<ConnectionId, Subscription>,
    next_id: u64,
}

/// In-memory keyed publish/subscribe store.
///
/// Values are JSON (`serde_json::Value`). Every `set` or `merge` on a key is
/// delivered to all subscriptions connected to that key; each subscription
/// may project the value through a nested path before delivery.
///
/// `Store` is a cheap clonable handle over shared state, so one instance can
/// be handed to the binding layer, to application modules, and to tests
/// without any global registration.
///
/// Callbacks are invoked after the store's internal lock is released, so a
/// callback is free to call back into the store (`get`, `set`, `connect`)
/// without deadlocking.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tether::store::{ConnectionConfig, Store};
///
/// let store = Store::new();
/// store.set("session", json!({"authToken": "abc"}));
///
/// let id = store.connect(ConnectionConfig::new("session", |value| {
///     println!("session is now {value:?}");
/// }));
///
/// store.merge("session", json!({"accountID": 12}));
/// store.disconnect(id);
/// ```
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the current value for a key, if one has been set.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().unwrap().data.get(key).cloned()
    }

    /// Replace the value for a key and deliver it to the key's subscriptions.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let pending = {
            let mut inner = self.inner.write().unwrap();
            inner.data.insert(key.clone(), value.clone());
            collect_deliveries(&inner, &key, &value)
        };
        trace!(%key, deliveries = pending.len(), "store set");
        for (callback, payload) in pending {
            callback(payload);
        }
    }

    /// Deep-merge a partial value into a key and deliver the result.
    ///
    /// Object fields merge recursively; arrays and scalars replace. Merging
    /// into a key that holds nothing behaves like [`Store::set`].
    pub fn merge(&self, key: impl Into<String>, partial: Value) {
        let key = key.into();
        let pending = {
            let mut inner = self.inner.write().unwrap();
            let slot = inner.data.entry(key.clone()).or_insert(Value::Null);
            deep_merge(slot, partial);
            let merged = slot.clone();
            collect_deliveries(&inner, &key, &merged)
        };
        trace!(%key, deliveries = pending.len(), "store merge");
        for (callback, payload) in pending {
            callback(payload);
        }
    }

    /// Open a subscription and return its handle.
    ///
    /// Unless the config disabled `init_with_stored_values`, a key that
    /// already holds a value is delivered to the callback before `connect`
    /// returns. A key with no stored value delivers nothing until something
    /// is set.
    pub fn connect(&self, config: ConnectionConfig) -> ConnectionId {
        let ConnectionConfig {
            key,
            path,
            init_with_stored_values,
            callback,
        } = config;

        let (id, initial) = {
            let mut inner = self.inner.write().unwrap();
            let id = ConnectionId(inner.next_id);
            inner.next_id += 1;
            let initial = if init_with_stored_values {
                inner
                    .data
                    .get(&key)
                    .map(|value| project(value, path.as_deref()))
            } else {
                None
            };
            inner.subscriptions.insert(
                id,
                Subscription {
                    key: key.clone(),
                    path,
                    callback: Arc::clone(&callback),
                },
            );
            (id, initial)
        };

        trace!(%key, id = id.0, "store connect");
        if let Some(payload) = initial {
            callback(payload);
        }
        id
    }

    /// Close a subscription. After this returns the callback is never
    /// invoked again. Unknown or already closed handles are ignored.
    pub fn disconnect(&self, id: ConnectionId) {
        let removed = self.inner.write().unwrap().subscriptions.remove(&id);
        if let Some(subscription) = removed {
            trace!(key = %subscription.key, id = id.0, "store disconnect");
        }
    }

    /// Number of open subscriptions for a key.
    pub fn subscription_count(&self, key: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .subscriptions
            .values()
            .filter(|subscription| subscription.key == key)
            .count()
    }
}

/// Snapshot the callbacks and payloads for a key so they can be invoked once
/// the lock is released.
fn collect_deliveries(
    inner: &StoreInner,
    key: &str,
    value: &Value,
) -> Vec<(Arc<ChangeCallback>, Option<Value>)> {
    inner
        .subscriptions
        .values()
        .filter(|subscription| subscription.key == key)
        .map(|subscription| {
            (
                Arc::clone(&subscription.callback),
                project(value, subscription.path.as_deref()),
            )
        })
        .collect()
}

fn project(value: &Value, path: Option<&str>) -> Option<Value> {
    match path {
        None => Some(value.clone()),
        Some(path) => resolve(value, path).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn get_set_merge() {
        let store = Store::new();
        assert_eq!(store.get("session"), None);

        store.set("session", json!({"authToken": "abc"}));
        assert_eq!(store.get("session"), Some(json!({"authToken": "abc"})));

        store.merge("session", json!({"accountID": 12}));
        assert_eq!(
            store.get("session"),
            Some(json!({"authToken": "abc", "accountID": 12}))
        );

        store.merge("fresh", json!({"a": 1}));
        assert_eq!(store.get("fresh"), Some(json!({"a": 1})));
    }

    #[test]
    fn connect_delivers_stored_value_immediately() {
        let store = Store::new();
        store.set("report_1", json!({"reportName": "general"}));

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        store.connect(ConnectionConfig::new("report_1", move |value| {
            sink.lock().unwrap().push(value);
        }));

        assert_eq!(
            *delivered.lock().unwrap(),
            vec![Some(json!({"reportName": "general"}))]
        );
    }

    #[test]
    fn connect_to_unset_key_delivers_nothing_until_set() {
        let store = Store::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        store.connect(ConnectionConfig::new("report_9", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        store.set("report_9", json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn path_projection_and_missing_path_sentinel() {
        let store = Store::new();
        store.set("item_42", json!({"displayName": "Alice", "other": 1}));

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        store.connect(
            ConnectionConfig::new("item_42", move |value| {
                sink.lock().unwrap().push(value);
            })
            .path("displayName"),
        );
        assert_eq!(*delivered.lock().unwrap(), vec![Some(json!("Alice"))]);

        // The path no longer resolves, so the delivery is the explicit
        // "no value" sentinel rather than silence.
        store.set("item_42", json!({"other": 2}));
        assert_eq!(
            *delivered.lock().unwrap(),
            vec![Some(json!("Alice")), None]
        );
    }

    #[test]
    fn init_with_stored_values_false_skips_initial_delivery() {
        let store = Store::new();
        store.set("draft_7", json!("saved text"));

        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        store.connect(
            ConnectionConfig::new("draft_7", move |value| {
                sink.lock().unwrap().push(value);
            })
            .init_with_stored_values(false),
        );
        assert!(delivered.lock().unwrap().is_empty());

        store.set("draft_7", json!("new text"));
        assert_eq!(*delivered.lock().unwrap(), vec![Some(json!("new text"))]);
    }

    #[test]
    fn disconnect_stops_deliveries_and_is_idempotent() {
        let store = Store::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = store.connect(ConnectionConfig::new("session", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        store.set("session", json!(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscription_count("session"), 1);

        store.disconnect(id);
        store.disconnect(id);
        store.set("session", json!(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscription_count("session"), 0);
    }

    #[test]
    fn callbacks_may_reenter_the_store() {
        let store = Store::new();
        let observed = Arc::new(Mutex::new(None));

        let handle = store.clone();
        let sink = Arc::clone(&observed);
        store.connect(ConnectionConfig::new("source", move |value| {
            // Reading and writing other keys from inside a delivery must not
            // deadlock.
            handle.set("mirror", value.unwrap_or(Value::Null));
            *sink.lock().unwrap() = handle.get("mirror");
        }));

        store.set("source", json!("ping"));
        assert_eq!(*observed.lock().unwrap(), Some(json!("ping")));
        assert_eq!(store.get("mirror"), Some(json!("ping")));
    }
}
