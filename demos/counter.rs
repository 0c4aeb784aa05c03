//! The "hello world" of eventstate: a counter with a subscriber.

use eventstate::EventState;
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = EventState::new(json!({"count": 0}));

    store.subscribe("count", |value, change| {
        println!("count: {} -> {}", change.old_value.as_ref().unwrap_or(&json!(null)), value);
    })?;

    for _ in 0..3 {
        let count = store.get("count")?.and_then(|v| v.as_i64()).unwrap_or(0);
        store.set("count", json!(count + 1))?;
    }

    println!("final: {}", store.get("count")?.unwrap_or_default());
    store.destroy();
    Ok(())
}
