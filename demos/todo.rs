//! Todo list kept in a store and persisted to disk on every change.

use eventstate::{persist, EventStatePlus};
use serde_json::{json, Value};

fn add(store: &EventStatePlus, text: &str) -> eventstate::Result<()> {
    let mut items = store
        .get("todos.items")?
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    let id = items.len() + 1;
    items.push(json!({"id": id, "text": text, "done": false}));
    store.set("todos.items", Value::Array(items))?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("todos.json");

    let store = EventStatePlus::upgrade(persist::restore(&file, json!({"todos": {"items": []}}))?);
    persist::attach(store.store(), &file)?;

    store.subscribe("todos.*", |_, change| println!("changed: {}", change.path))?;

    add(&store, "buy milk")?;
    add(&store, "write docs")?;
    store.batch(|| store.set("todos.items.0.done", json!(true)))??;

    // A second store restored from disk sees the same list.
    let reloaded = persist::restore(&file, json!({}))?;
    println!("\nTodos:");
    for item in reloaded.get("todos.items")?.unwrap_or_default().as_array().into_iter().flatten() {
        let check = if item["done"] == json!(true) { "x" } else { " " };
        println!("  [{}] {}", check, item["text"].as_str().unwrap_or(""));
    }

    store.destroy();
    Ok(())
}
