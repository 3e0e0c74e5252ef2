//! Bound view example: a header view fed by templated store keys

use serde_json::{json, Value};
use tether::{Binding, FnView, KeyDescriptor, Mapping, Props, Store};

fn props(value: Value) -> Props {
    match value {
        Value::Object(fields) => fields,
        _ => unreachable!(),
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Bound View Example ===\n");

    // Seed the store with two reports
    let store = Store::new();
    store.set(
        "report_1",
        json!({"reportName": "general", "isPinned": false}),
    );
    store.set(
        "report_2",
        json!({"reportName": "announcements", "isPinned": true}),
    );

    // Declare which keys feed which view properties
    let binding = Binding::new(
        store.clone(),
        Mapping::new()
            .with(
                "reportName",
                KeyDescriptor::new("report_%DATAFROMPROPS%")
                    .path("reportName")
                    .path_for_props("reportID"),
            )
            .with(
                "isPinned",
                KeyDescriptor::new("report_%DATAFROMPROPS%")
                    .path("isPinned")
                    .path_for_props("reportID"),
            ),
    )
    .expect("mapping is well formed");

    let header = binding.wrap(FnView::new(|props: &Props| {
        println!(
            "render: {} (pinned: {})",
            props["reportName"], props["isPinned"]
        );
    }));

    // Mounting renders once with the resolved view-model
    println!("Mounting on report 1...");
    header
        .mount(props(json!({"reportID": "1"})))
        .expect("mount succeeds");

    // Store changes re-render the view
    println!("\nPinning report 1...");
    store.merge("report_1", json!({"isPinned": true}));

    // A props change repoints the subscriptions at the new key
    println!("\nSwitching to report 2...");
    header
        .update(props(json!({"reportID": "2"})))
        .expect("update succeeds");

    println!("\nUnmounting...");
    header.unmount();

    // No render happens after unmount
    store.merge("report_2", json!({"isPinned": false}));
    println!("Done.");
}
