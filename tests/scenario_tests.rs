mod common;

use common::{calls, is_valid_email, recorder, todo, values};
use eventstate::{EventState, EventStatePlus, StateStore};
use serde_json::{json, Value};

fn increment(store: &impl StateStore) {
    let count = store.get("count").unwrap().and_then(|v| v.as_i64()).unwrap_or(0);
    store.set("count", json!(count + 1)).unwrap();
}

fn run_counter(store: &impl StateStore) {
    let c = calls();
    store.subscribe_boxed("count", Box::new(recorder(&c))).unwrap();

    for _ in 0..3 {
        increment(store);
    }

    assert_eq!(store.get("count").unwrap(), Some(json!(3)));
    assert_eq!(values(&c), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_counter_on_core_store() {
    run_counter(&EventState::new(json!({"count": 0})));
}

#[test]
fn test_counter_on_facade() {
    run_counter(&EventStatePlus::new(json!({"count": 0})));
}

#[test]
fn test_counter_through_trait_object() {
    let store: Box<dyn StateStore> = Box::new(EventState::new(json!({"count": 0})));
    store.set("count", json!(41)).unwrap();
    store.set("count", json!(42)).unwrap();
    assert_eq!(store.get("count").unwrap(), Some(json!(42)));
    store.destroy();
    assert!(store.is_destroyed());
}

#[test]
fn test_todo_add() {
    let store = EventState::new(json!({"todos": {"items": []}}));
    let c = calls();
    store.subscribe("todos.*", recorder(&c)).unwrap();

    let mut items = store
        .get("todos.items")
        .unwrap()
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    items.push(todo(1, "Buy milk"));
    store.set("todos.items", Value::Array(items)).unwrap();

    let items = store.get("todos.items").unwrap().unwrap();
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0], json!({"id": 1, "text": "Buy milk", "done": false}));
    assert_eq!(c.borrow().len(), 1);
}

#[test]
fn test_todo_toggle_and_remove() {
    let store = EventStatePlus::new(json!({"todos": {"items": [todo(1, "a"), todo(2, "b")]}}));

    store.set("todos.items.1.done", json!(true)).unwrap();
    assert_eq!(store.get("todos.items.1.done").unwrap(), Some(json!(true)));

    let remaining: Vec<Value> = store
        .get("todos.items")
        .unwrap()
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .into_iter()
        .filter(|item| item["id"] != json!(1))
        .collect();
    store.set("todos.items", Value::Array(remaining)).unwrap();

    assert_eq!(
        store.get("todos.items").unwrap(),
        Some(json!([{"id": 2, "text": "b", "done": true}]))
    );
}

#[test]
fn test_form_validation_derived_state() {
    let store = EventStatePlus::new(json!({"email": "", "errors": {}}));
    let validator = store.clone();
    store
        .subscribe("email", move |value, _| {
            let email = value.as_str().unwrap_or("");
            let errors = if is_valid_email(email) {
                json!({})
            } else {
                json!({"email": "Invalid email"})
            };
            validator.set("errors", errors).unwrap();
        })
        .unwrap();

    store.set("email", json!("bad")).unwrap();
    assert_eq!(
        store.get("errors.email").unwrap(),
        Some(json!("Invalid email"))
    );

    store.set("email", json!("ann@example.com")).unwrap();
    assert_eq!(store.get("errors").unwrap(), Some(json!({})));
    store.destroy();
}

#[test]
fn test_form_submit_as_one_batch() {
    let store = EventStatePlus::new(json!({"form": {}}));
    let c = calls();
    store.subscribe("form.*", recorder(&c)).unwrap();

    store
        .set_many_json(json!({
            "form.name": "Ann",
            "form.email": "ann@example.com",
            "form.submitted": true,
        }))
        .unwrap();

    assert_eq!(c.borrow().len(), 3);
    assert_eq!(
        store.get("form").unwrap(),
        Some(json!({"name": "Ann", "email": "ann@example.com", "submitted": true}))
    );
}
