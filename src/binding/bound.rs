use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use serde_json::Value;
use tracing::debug;

use crate::store::{ConnectionConfig, ConnectionId, Store};
use crate::value::resolve_in_object;

use super::descriptor::{KeyDescriptor, Mapping};
use super::error::BindingError;
use super::template;
use super::view::{Props, View};

/// Lifecycle of a bound component instance.
///
/// Deliveries are only accepted while Active; disconnects are only issued
/// from Active or Unmounting. A store callback that fires after unmount sees
/// Unmounted and does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Unmounted,
    Mounting,
    Active,
    Unmounting,
}

/// Identifies the subscription slot a delivery belongs to.
#[derive(Clone)]
enum SlotKey {
    /// Static subscription; the handle pool is keyed by property name.
    Static,
    /// Prop-derived subscription; the pool is keyed by the `path_for_props`
    /// string, and the epoch records which generation of the slot the
    /// connection was opened under.
    Prop { path_for_props: String, epoch: u64 },
}

/// One generation of prop-derived subscriptions sharing a `path_for_props`.
struct PropSlot {
    epoch: u64,
    connections: Vec<ConnectionId>,
}

/// Everything needed to open one subscription, resolved against the current
/// props before any state is touched.
struct ConnectPlan {
    property: String,
    key: String,
    path: Option<String>,
    init_with_stored_values: bool,
    slot: SlotKey,
}

struct Instance {
    lifecycle: Lifecycle,
    props: Props,
    /// Delivered values by view property name. The "no value" sentinel is
    /// recorded as JSON null; presence in the map is what the loading gate
    /// checks.
    values: HashMap<String, Value>,
    loading: bool,
    /// Set while a mount/update cycle is running so deliveries inside the
    /// cycle coalesce into a single render at the end.
    in_cycle: bool,
    dirty: bool,
    static_connections: HashMap<String, ConnectionId>,
    prop_slots: HashMap<String, PropSlot>,
}

impl Instance {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Unmounted,
            props: Props::new(),
            values: HashMap::new(),
            loading: true,
            in_cycle: false,
            dirty: false,
            static_connections: HashMap::new(),
            prop_slots: HashMap::new(),
        }
    }

    /// Open the loading gate once every required property has a delivery.
    /// The gate never closes again.
    fn refresh_loading(&mut self, mapping: &Mapping) {
        if !self.loading {
            return;
        }
        let ready = mapping
            .required_for_init()
            .all(|property| self.values.contains_key(property));
        if ready {
            self.loading = false;
        }
    }

    /// Owner props merged with the delivered values. Undelivered properties
    /// stay absent; internal bookkeeping is never forwarded.
    fn merged_props(&self, mapping: &Mapping) -> Props {
        let mut props = self.props.clone();
        for (property, _) in mapping.iter() {
            if let Some(value) = self.values.get(property) {
                props.insert(property.to_owned(), value.clone());
            }
        }
        props
    }
}

/// A validated mapping bound to a store.
///
/// `Binding` is the wrap-time artifact: it validates the mapping once and
/// then stamps out [`Bound`] components for any number of views.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tether::binding::{Binding, FnView, KeyDescriptor, Mapping, Props};
/// use tether::store::Store;
///
/// let store = Store::new();
/// store.set("session", json!({"accountID": 12}));
///
/// let binding = Binding::new(
///     store.clone(),
///     Mapping::new().with("session", KeyDescriptor::new("session")),
/// )
/// .unwrap();
///
/// let bound = binding.wrap(FnView::new(|props: &Props| {
///     assert!(props.contains_key("session"));
/// }));
/// bound.mount(Props::new()).unwrap();
/// ```
#[derive(Clone)]
pub struct Binding {
    store: Store,
    mapping: Arc<Mapping>,
}

impl Binding {
    /// Validate `mapping` and bind it to `store`.
    ///
    /// Configuration errors (empty keys, a placeholder with no
    /// `path_for_props`, duplicate properties) are reported here rather than
    /// at first connection.
    pub fn new(store: Store, mapping: Mapping) -> Result<Self, BindingError> {
        mapping.validate()?;
        Ok(Self {
            store,
            mapping: Arc::new(mapping),
        })
    }

    /// Wrap a view component. The result is unmounted until
    /// [`Bound::mount`] is called.
    pub fn wrap<V: View>(&self, view: V) -> Bound<V> {
        Bound {
            shared: Arc::new(Shared {
                store: self.store.clone(),
                mapping: Arc::clone(&self.mapping),
                view,
                instance: RwLock::new(Instance::new()),
            }),
        }
    }
}

struct Shared<V: View> {
    store: Store,
    mapping: Arc<Mapping>,
    view: V,
    instance: RwLock<Instance>,
}

impl<V: View> Shared<V> {
    /// Record a delivery and render if it is visible outside a cycle.
    fn deliver(&self, slot: &SlotKey, property: &str, value: Option<Value>) {
        if let Some(props) = self.record(slot, property, value) {
            self.view.render(&props);
        }
    }

    fn record(&self, slot: &SlotKey, property: &str, value: Option<Value>) -> Option<Props> {
        let mut instance = self.instance.write().unwrap();
        if instance.lifecycle != Lifecycle::Active {
            return None;
        }
        if let SlotKey::Prop {
            path_for_props,
            epoch,
        } = slot
        {
            // A delivery from a superseded generation of this slot must not
            // overwrite state recorded by its replacement.
            let current = instance
                .prop_slots
                .get(path_for_props.as_str())
                .map(|slot| slot.epoch);
            if current != Some(*epoch) {
                return None;
            }
        }
        instance
            .values
            .insert(property.to_owned(), value.unwrap_or(Value::Null));
        instance.refresh_loading(&self.mapping);
        if instance.in_cycle {
            instance.dirty = true;
            return None;
        }
        if instance.loading {
            return None;
        }
        Some(instance.merged_props(&self.mapping))
    }
}

/// A view wrapped with store subscriptions.
///
/// Mounting opens one subscription per mapping entry, updating re-templates
/// and reconnects the prop-derived ones, and unmounting closes everything.
/// The view renders only once all required keys have delivered, and then
/// again on every change.
///
/// Dropping a `Bound` unmounts it.
pub struct Bound<V: View> {
    shared: Arc<Shared<V>>,
}

impl<V: View> Bound<V> {
    /// Mount the component with its initial props.
    ///
    /// Resolves every descriptor against `props`, opens the subscriptions,
    /// then evaluates the loading gate. If the gate opens (every required
    /// key already had a stored value), the view renders exactly once before
    /// this returns.
    pub fn mount(&self, props: Props) -> Result<(), BindingError> {
        let plans = {
            let mut instance = self.shared.instance.write().unwrap();
            if instance.lifecycle != Lifecycle::Unmounted {
                return Err(BindingError::AlreadyMounted);
            }

            // Resolve all keys first so an unresolvable prop leaves the
            // component cleanly unmounted.
            let plans = build_plans(&self.shared.mapping, &props)?;

            instance.lifecycle = Lifecycle::Mounting;
            instance.props = props;
            instance.values.clear();
            instance.loading = true;
            instance.in_cycle = true;
            instance.dirty = true;
            instance.static_connections.clear();
            instance.prop_slots.clear();
            for plan in &plans {
                if let SlotKey::Prop { path_for_props, .. } = &plan.slot {
                    instance
                        .prop_slots
                        .entry(path_for_props.clone())
                        .or_insert_with(|| PropSlot {
                            epoch: 0,
                            connections: Vec::new(),
                        });
                }
            }

            // Initial deliveries arrive synchronously while the connections
            // open, so the instance has to be Active before the first
            // connect call.
            instance.lifecycle = Lifecycle::Active;
            plans
        };

        debug!(subscriptions = plans.len(), "mounting bound component");
        for plan in plans {
            self.open(plan);
        }
        self.finish_cycle();
        Ok(())
    }

    /// Apply a props update.
    ///
    /// Every prop-derived slot whose extracted value changed is superseded:
    /// its old connections are disconnected before the re-templated
    /// replacements are opened, and its epoch advances so a late delivery
    /// from the old generation is discarded. The loading gate is
    /// re-evaluated afterwards.
    pub fn update(&self, props: Props) -> Result<(), BindingError> {
        let (stale, plans) = {
            let mut instance = self.shared.instance.write().unwrap();
            if instance.lifecycle != Lifecycle::Active {
                return Err(BindingError::NotMounted);
            }

            let mut changed: Vec<String> = Vec::new();
            for (_, descriptor) in self.shared.mapping.iter() {
                if let Some(path) = &descriptor.path_for_props {
                    if changed.iter().any(|known| known == path) {
                        continue;
                    }
                    let previous = resolve_in_object(&instance.props, path);
                    let current = resolve_in_object(&props, path);
                    if previous != current {
                        changed.push(path.clone());
                    }
                }
            }

            // Re-template every descriptor on a changed slot before touching
            // any state, so a bad prop value fails the update atomically.
            let mut plans = Vec::new();
            for (property, descriptor) in self.shared.mapping.iter() {
                if let Some(path) = &descriptor.path_for_props {
                    if changed.iter().any(|known| known == path) {
                        plans.push(build_plan(property, descriptor, &props)?);
                    }
                }
            }

            instance.props = props;
            instance.in_cycle = true;
            instance.dirty = true;

            let mut stale = Vec::new();
            for path in &changed {
                if let Some(slot) = instance.prop_slots.get_mut(path.as_str()) {
                    stale.extend(slot.connections.drain(..));
                    slot.epoch += 1;
                }
            }
            for plan in &mut plans {
                if let SlotKey::Prop {
                    path_for_props,
                    epoch,
                } = &mut plan.slot
                {
                    if let Some(slot) = instance.prop_slots.get(path_for_props.as_str()) {
                        *epoch = slot.epoch;
                    }
                }
            }
            (stale, plans)
        };

        if !stale.is_empty() {
            debug!(
                closed = stale.len(),
                reopened = plans.len(),
                "props change superseded subscriptions"
            );
        }
        // Old connections close before their replacements open.
        for id in stale {
            self.shared.store.disconnect(id);
        }
        for plan in plans {
            self.open(plan);
        }
        self.finish_cycle();
        Ok(())
    }

    /// Unmount the component, closing every open subscription exactly once.
    /// Further store callbacks for this instance are inert. Idempotent.
    pub fn unmount(&self) {
        let stale = {
            let mut instance = self.shared.instance.write().unwrap();
            if instance.lifecycle != Lifecycle::Active {
                return;
            }
            instance.lifecycle = Lifecycle::Unmounting;
            let mut stale: Vec<ConnectionId> = instance
                .static_connections
                .drain()
                .map(|(_, id)| id)
                .collect();
            for slot in instance.prop_slots.values_mut() {
                stale.extend(slot.connections.drain(..));
            }
            stale
        };

        debug!(connections = stale.len(), "unmounting bound component");
        for id in stale {
            self.shared.store.disconnect(id);
        }
        self.shared.instance.write().unwrap().lifecycle = Lifecycle::Unmounted;
    }

    /// Whether the loading gate is still closed.
    pub fn is_loading(&self) -> bool {
        self.shared.instance.read().unwrap().loading
    }

    /// Whether the component is mounted and accepting deliveries.
    pub fn is_mounted(&self) -> bool {
        self.shared.instance.read().unwrap().lifecycle == Lifecycle::Active
    }

    /// Snapshot of the props the view currently renders with, or `None`
    /// while the component is unmounted or still loading.
    pub fn resolved_props(&self) -> Option<Props> {
        let instance = self.shared.instance.read().unwrap();
        if instance.lifecycle != Lifecycle::Active || instance.loading {
            return None;
        }
        Some(instance.merged_props(&self.shared.mapping))
    }

    fn open(&self, plan: ConnectPlan) {
        let ConnectPlan {
            property,
            key,
            path,
            init_with_stored_values,
            slot,
        } = plan;

        debug!(%property, %key, "opening subscription");
        let weak: Weak<Shared<V>> = Arc::downgrade(&self.shared);
        let callback_slot = slot.clone();
        let callback_property = property.clone();
        let mut config = ConnectionConfig::new(key, move |value| {
            if let Some(shared) = weak.upgrade() {
                shared.deliver(&callback_slot, &callback_property, value);
            }
        })
        .init_with_stored_values(init_with_stored_values);
        if let Some(path) = path {
            config = config.path(path);
        }

        let id = self.shared.store.connect(config);

        let mut instance = self.shared.instance.write().unwrap();
        match slot {
            SlotKey::Static => {
                instance.static_connections.insert(property, id);
            }
            SlotKey::Prop { path_for_props, .. } => {
                if let Some(slot) = instance.prop_slots.get_mut(path_for_props.as_str()) {
                    slot.connections.push(id);
                }
            }
        }
    }

    /// Close out a mount/update cycle: evaluate the gate once more and issue
    /// the cycle's single render if anything is visible.
    fn finish_cycle(&self) {
        let snapshot = {
            let mut instance = self.shared.instance.write().unwrap();
            instance.refresh_loading(&self.shared.mapping);
            instance.in_cycle = false;
            let render = instance.lifecycle == Lifecycle::Active
                && !instance.loading
                && instance.dirty;
            instance.dirty = false;
            if render {
                Some(instance.merged_props(&self.shared.mapping))
            } else {
                None
            }
        };
        if let Some(props) = snapshot {
            self.shared.view.render(&props);
        }
    }
}

impl<V: View> Drop for Bound<V> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn build_plans(mapping: &Mapping, props: &Props) -> Result<Vec<ConnectPlan>, BindingError> {
    mapping
        .iter()
        .map(|(property, descriptor)| build_plan(property, descriptor, props))
        .collect()
}

fn build_plan(
    property: &str,
    descriptor: &KeyDescriptor,
    props: &Props,
) -> Result<ConnectPlan, BindingError> {
    let key = templated_key(property, descriptor, props)?;
    let slot = match &descriptor.path_for_props {
        None => SlotKey::Static,
        Some(path) => SlotKey::Prop {
            path_for_props: path.clone(),
            epoch: 0,
        },
    };
    Ok(ConnectPlan {
        property: property.to_owned(),
        key,
        path: descriptor.path.clone(),
        init_with_stored_values: descriptor.init_with_stored_values,
        slot,
    })
}

/// Expand a descriptor's key template against the current props.
fn templated_key(
    property: &str,
    descriptor: &KeyDescriptor,
    props: &Props,
) -> Result<String, BindingError> {
    match &descriptor.path_for_props {
        Some(path) if template::has_placeholder(&descriptor.key) => {
            let value = resolve_in_object(props, path)
                .and_then(template::placeholder_value)
                .ok_or_else(|| BindingError::PropValueMissing {
                    property: property.to_owned(),
                    path: path.clone(),
                })?;
            Ok(template::expand(&descriptor.key, &value))
        }
        _ => Ok(descriptor.key.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Probe {
        renders: AtomicUsize,
        last: Mutex<Option<Props>>,
    }

    impl Probe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                renders: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn renders(&self) -> usize {
            self.renders.load(Ordering::SeqCst)
        }

        fn last(&self) -> Option<Props> {
            self.last.lock().unwrap().clone()
        }
    }

    struct ProbeView(Arc<Probe>);

    impl View for ProbeView {
        fn render(&self, props: &Props) {
            self.0.renders.fetch_add(1, Ordering::SeqCst);
            *self.0.last.lock().unwrap() = Some(props.clone());
        }
    }

    fn props(value: serde_json::Value) -> Props {
        match value {
            Value::Object(fields) => fields,
            other => panic!("expected object props, got {other}"),
        }
    }

    #[test]
    fn mount_renders_once_with_merged_props() {
        let store = Store::new();
        store.set("session", json!({"accountID": 12}));
        store.set("network", json!({"isOffline": false}));

        let binding = Binding::new(
            store,
            Mapping::new()
                .with("session", KeyDescriptor::new("session"))
                .with("network", KeyDescriptor::new("network")),
        )
        .unwrap();

        let probe = Probe::new();
        let bound = binding.wrap(ProbeView(Arc::clone(&probe)));
        bound.mount(props(json!({"ownerProp": true}))).unwrap();

        assert!(!bound.is_loading());
        assert_eq!(probe.renders(), 1);
        assert_eq!(
            probe.last().unwrap(),
            props(json!({
                "ownerProp": true,
                "session": {"accountID": 12},
                "network": {"isOffline": false},
            }))
        );
    }

    #[test]
    fn mount_is_rejected_while_mounted() {
        let store = Store::new();
        let binding =
            Binding::new(store, Mapping::new().with("session", KeyDescriptor::new("session")))
                .unwrap();
        let bound = binding.wrap(ProbeView(Probe::new()));

        bound.mount(Props::new()).unwrap();
        assert_eq!(bound.mount(Props::new()), Err(BindingError::AlreadyMounted));
    }

    #[test]
    fn update_before_mount_is_rejected() {
        let store = Store::new();
        let binding =
            Binding::new(store, Mapping::new().with("session", KeyDescriptor::new("session")))
                .unwrap();
        let bound = binding.wrap(ProbeView(Probe::new()));

        assert_eq!(bound.update(Props::new()), Err(BindingError::NotMounted));
    }

    #[test]
    fn missing_prop_value_fails_mount_cleanly() {
        let store = Store::new();
        let binding = Binding::new(
            store.clone(),
            Mapping::new().with(
                "report",
                KeyDescriptor::new("report_%DATAFROMPROPS%").path_for_props("reportID"),
            ),
        )
        .unwrap();
        let bound = binding.wrap(ProbeView(Probe::new()));

        assert_eq!(
            bound.mount(Props::new()),
            Err(BindingError::PropValueMissing {
                property: "report".to_owned(),
                path: "reportID".to_owned(),
            })
        );
        assert!(!bound.is_mounted());
        assert_eq!(store.subscription_count("report_%DATAFROMPROPS%"), 0);

        // A later mount with usable props succeeds.
        bound.mount(props(json!({"reportID": "7"}))).unwrap();
        assert!(bound.is_mounted());
        assert_eq!(store.subscription_count("report_7"), 1);
    }

    #[test]
    fn stale_delivery_from_superseded_slot_is_discarded() {
        let store = Store::new();
        store.set("item_42", json!({"displayName": "Alice"}));
        store.set("item_43", json!({"displayName": "Bob"}));

        let binding = Binding::new(
            store,
            Mapping::new().with(
                "name",
                KeyDescriptor::new("item_%DATAFROMPROPS%")
                    .path("displayName")
                    .path_for_props("itemId"),
            ),
        )
        .unwrap();

        let probe = Probe::new();
        let bound = binding.wrap(ProbeView(Arc::clone(&probe)));
        bound.mount(props(json!({"itemId": "42"}))).unwrap();
        bound.update(props(json!({"itemId": "43"}))).unwrap();
        assert_eq!(probe.last().unwrap()["name"], json!("Bob"));

        // Simulate a late callback from the superseded generation: epoch 0
        // was replaced by the update above, so the write must be discarded.
        bound.shared.deliver(
            &SlotKey::Prop {
                path_for_props: "itemId".to_owned(),
                epoch: 0,
            },
            "name",
            Some(json!("Alice")),
        );
        assert_eq!(bound.resolved_props().unwrap()["name"], json!("Bob"));

        // A delivery from the live generation still lands.
        bound.shared.deliver(
            &SlotKey::Prop {
                path_for_props: "itemId".to_owned(),
                epoch: 1,
            },
            "name",
            Some(json!("Bobby")),
        );
        assert_eq!(bound.resolved_props().unwrap()["name"], json!("Bobby"));
    }

    #[test]
    fn descriptors_sharing_a_props_path_reconnect_together() {
        let store = Store::new();
        store.set("report_1", json!({"reportName": "one"}));
        store.set("reportActions_1", json!({"0": {"text": "hi"}}));
        store.set("report_2", json!({"reportName": "two"}));
        store.set("reportActions_2", json!({"0": {"text": "yo"}}));

        let binding = Binding::new(
            store.clone(),
            Mapping::new()
                .with(
                    "report",
                    KeyDescriptor::new("report_%DATAFROMPROPS%").path_for_props("reportID"),
                )
                .with(
                    "reportActions",
                    KeyDescriptor::new("reportActions_%DATAFROMPROPS%")
                        .path_for_props("reportID"),
                ),
        )
        .unwrap();

        let probe = Probe::new();
        let bound = binding.wrap(ProbeView(Arc::clone(&probe)));
        bound.mount(props(json!({"reportID": 1}))).unwrap();
        assert_eq!(store.subscription_count("report_1"), 1);
        assert_eq!(store.subscription_count("reportActions_1"), 1);

        bound.update(props(json!({"reportID": 2}))).unwrap();
        assert_eq!(store.subscription_count("report_1"), 0);
        assert_eq!(store.subscription_count("reportActions_1"), 0);
        assert_eq!(store.subscription_count("report_2"), 1);
        assert_eq!(store.subscription_count("reportActions_2"), 1);

        let last = probe.last().unwrap();
        assert_eq!(last["report"], json!({"reportName": "two"}));
        assert_eq!(last["reportActions"], json!({"0": {"text": "yo"}}));
    }

    #[test]
    fn drop_unmounts_and_disconnects() {
        let store = Store::new();
        store.set("session", json!(1));
        let binding = Binding::new(
            store.clone(),
            Mapping::new().with("session", KeyDescriptor::new("session")),
        )
        .unwrap();

        let bound = binding.wrap(ProbeView(Probe::new()));
        bound.mount(Props::new()).unwrap();
        assert_eq!(store.subscription_count("session"), 1);

        drop(bound);
        assert_eq!(store.subscription_count("session"), 0);
    }
}
