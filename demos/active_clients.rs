//! Active-client registry example: leadership between two clients

use tether::{ActiveClients, ConnectionConfig, Store, ACTIVE_CLIENTS};

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Active Clients Example ===\n");

    let store = Store::new();

    // Watch leadership changes through a plain store subscription
    store.connect(ConnectionConfig::new(ACTIVE_CLIENTS, |record| {
        println!("active clients record: {record:?}");
    }));

    let first = ActiveClients::register(store.clone());
    println!("first client {} leads: {}", first.client_id(), first.is_leader());

    let second = ActiveClients::register(store.clone());
    println!(
        "after second registration, first leads: {}, second leads: {}",
        first.is_leader(),
        second.is_leader()
    );

    // A departing non-leader does not disturb the current leader
    first.remove();
    println!("second still leads: {}", second.is_leader());

    second.remove();
    println!("record after everyone left: {:?}", store.get(ACTIVE_CLIENTS));
}
