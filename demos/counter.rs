//! Counter Example - store, binding, events and removal
//!
//! This example demonstrates the full binding loop:
//! - Creating a store and binding a view to the `count` slice
//! - Clicking a delegated button handler that dispatches an updater
//! - Ticking the runtime so the view re-renders
//! - Removing the view and watching its binding get cleaned up
//!
//! Run with: RUST_LOG=debug cargo run --example counter

use serde_json::json;
use spark_bind::{attr, on, Action, Runtime, RuntimeConfig, Value};
use tracing_subscriber::EnvFilter;

fn main() -> spark_bind::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== spark-bind Counter Example ===\n");

    let runtime = Runtime::new(RuntimeConfig::default())?;
    runtime.create_store(json!({ "count": 0 }))?;

    let counter = runtime.bind("count", |cx| {
        let dispatcher = cx.dispatcher();
        cx.host()
            .html(
                "button",
                vec![
                    attr("class", "counter"),
                    on("click", move |_| {
                        let increment =
                            Action::update("count", |v| json!(v.as_i64().unwrap_or(0) + 1));
                        if let Err(err) = dispatcher.dispatch(increment) {
                            eprintln!("dispatch failed: {err}");
                        }
                    }),
                ],
                vec![format!("Clicked {} times", cx.value()).into()],
            )
            .ok()
    })?;

    let root = runtime.host().root();
    let button = counter.create(Value::Null)?;
    runtime.mount(button, root)?;
    println!("Initial:  {}", runtime.host().text_content(root));

    for _ in 0..3 {
        // The live button changes on every render, so look it up again
        let live = runtime.host().children(root)[0];
        runtime.host().dispatch_event("click", live);
        runtime.run_until_idle();
        println!("Rendered: {}", runtime.host().text_content(root));
    }

    let live = runtime.host().children(root)[0];
    runtime.host().remove_child(root, live)?;
    runtime.run_until_idle();
    println!(
        "\nAfter removal: {} subscriber(s), {} watcher(s), click listener installed: {}",
        runtime.subscriber_count("count"),
        runtime.watcher_count(),
        runtime.host().events().has_listener("click"),
    );

    Ok(())
}
