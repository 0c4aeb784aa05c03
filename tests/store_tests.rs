mod common;

use common::{calls, recorder};
use eventstate::{Error, EventState};
use serde_json::{json, Value};

#[test]
fn test_get_root_returns_whole_tree() {
    let store = EventState::new(json!({"count": 0, "user": {"name": "Ann"}}));
    assert_eq!(
        store.get("").unwrap(),
        Some(json!({"count": 0, "user": {"name": "Ann"}}))
    );
}

#[test]
fn test_get_nested_path() {
    let store = EventState::new(json!({"user": {"profile": {"name": "Ann"}}}));
    assert_eq!(store.get("user.profile.name").unwrap(), Some(json!("Ann")));
    assert_eq!(
        store.get("user.profile").unwrap(),
        Some(json!({"name": "Ann"}))
    );
}

#[test]
fn test_get_missing_path_is_none() {
    let store = EventState::new(json!({"user": {"name": "Ann"}}));
    assert_eq!(store.get("user.email").unwrap(), None);
    assert_eq!(store.get("settings.theme.color").unwrap(), None);
}

#[test]
fn test_get_through_scalar_is_none() {
    let store = EventState::new(json!({"count": 3}));
    assert_eq!(store.get("count.value").unwrap(), None);
}

#[test]
fn test_get_array_element() {
    let store = EventState::new(json!({"items": ["a", "b"]}));
    assert_eq!(store.get("items.1").unwrap(), Some(json!("b")));
    assert_eq!(store.get("items.2").unwrap(), None);
    assert_eq!(store.get("items.first").unwrap(), None);
}

#[test]
fn test_set_then_get_round_trip() {
    let store = EventState::default();
    let value = json!({"tags": ["x", "y"], "n": 1.5});
    let returned = store.set("a.b", value.clone()).unwrap();
    assert_eq!(returned, value);
    assert_eq!(store.get("a.b").unwrap(), Some(value));
}

#[test]
fn test_set_creates_intermediate_objects() {
    let store = EventState::default();
    store.set("a.b.c", json!(1)).unwrap();

    assert_eq!(store.get("a.b").unwrap(), Some(json!({"c": 1})));
    assert_eq!(store.get("a").unwrap(), Some(json!({"b": {"c": 1}})));
}

#[test]
fn test_set_overwrites_scalar_intermediate() {
    let store = EventState::new(json!({"a": 5}));
    store.set("a.b", json!(true)).unwrap();
    assert_eq!(store.get("a").unwrap(), Some(json!({"b": true})));
}

#[test]
fn test_set_overwrites_null_intermediate() {
    let store = EventState::new(json!({"a": null}));
    store.set("a.b", json!("x")).unwrap();
    assert_eq!(store.get("a.b").unwrap(), Some(json!("x")));
}

#[test]
fn test_set_keeps_sibling_keys() {
    let store = EventState::new(json!({"user": {"name": "Ann", "age": 30}}));
    store.set("user.name", json!("Bob")).unwrap();
    assert_eq!(
        store.get("user").unwrap(),
        Some(json!({"name": "Bob", "age": 30}))
    );
}

#[test]
fn test_set_empty_path_is_noop() {
    let store = EventState::new(json!({"count": 0}));
    let c = calls();
    store.subscribe("*", recorder(&c)).unwrap();

    let returned = store.set("", json!(123)).unwrap();

    assert_eq!(returned, json!(123));
    assert_eq!(store.get("").unwrap(), Some(json!({"count": 0})));
    assert!(c.borrow().is_empty(), "no-op write must not notify");
}

#[test]
fn test_set_array_element_and_append() {
    let store = EventState::new(json!({"items": ["a"]}));
    store.set("items.0", json!("A")).unwrap();
    store.set("items.1", json!("B")).unwrap();
    assert_eq!(store.get("items").unwrap(), Some(json!(["A", "B"])));
}

#[test]
fn test_set_array_past_end_is_rejected() {
    let store = EventState::new(json!({"items": ["a"]}));
    let err = store.set("items.5", json!("x")).unwrap_err();
    assert!(matches!(err, Error::InvalidPath { .. }));
    assert_eq!(store.get("items").unwrap(), Some(json!(["a"])));
}

#[test]
fn test_set_named_key_on_array_is_rejected_without_mutation() {
    let store = EventState::new(json!({"items": []}));
    let err = store.set("items.first.text", json!("x")).unwrap_err();
    assert!(matches!(err, Error::InvalidPath { ref path, .. } if path == "items.first.text"));
    assert_eq!(store.get("").unwrap(), Some(json!({"items": []})));
}

#[test]
fn test_initial_value_is_owned() {
    let mut initial = json!({"count": 0});
    let store = EventState::new(initial.clone());

    initial["count"] = json!(99);
    assert_eq!(store.get("count").unwrap(), Some(json!(0)));

    store.set("count", json!(1)).unwrap();
    assert_eq!(initial["count"], json!(99));
}

#[test]
fn test_returned_value_is_a_copy() {
    let store = EventState::new(json!({"items": [1, 2]}));
    let mut items = store.get("items").unwrap().unwrap();
    items.as_array_mut().unwrap().push(json!(3));
    assert_eq!(store.get("items").unwrap(), Some(json!([1, 2])));
}

#[test]
fn test_null_initial_becomes_empty_object() {
    let store = EventState::new(Value::Null);
    assert_eq!(store.get("").unwrap(), Some(json!({})));
}

#[test]
fn test_from_serialize() {
    #[derive(serde::Serialize)]
    struct App {
        count: u32,
        name: &'static str,
    }
    let store = EventState::from_serialize(&App {
        count: 2,
        name: "demo",
    })
    .unwrap();
    assert_eq!(store.get("count").unwrap(), Some(json!(2)));
    assert_eq!(store.get("name").unwrap(), Some(json!("demo")));
}

#[test]
fn test_clones_share_state() {
    let store = EventState::default();
    let other = store.clone();
    other.set("shared", json!(true)).unwrap();
    assert_eq!(store.get("shared").unwrap(), Some(json!(true)));
}

#[test]
fn test_destroyed_store_rejects_every_call() {
    let store = EventState::new(json!({"count": 0}));
    store.destroy();

    for _ in 0..2 {
        assert!(matches!(store.get("count"), Err(Error::Destroyed)));
        assert!(matches!(store.get(""), Err(Error::Destroyed)));
        assert!(matches!(store.set("count", json!(1)), Err(Error::Destroyed)));
        assert!(matches!(
            store.subscribe("count", |_, _| {}),
            Err(Error::Destroyed)
        ));
    }
    assert!(store.is_destroyed());
}

#[test]
fn test_destroy_is_idempotent_and_clears_listeners() {
    let store = EventState::default();
    store.subscribe("a", |_, _| {}).unwrap();
    store.subscribe("*", |_, _| {}).unwrap();

    store.destroy();
    store.destroy();

    assert_eq!(store.listener_count("a"), 0);
    assert_eq!(store.listener_count("*"), 0);
}

#[test]
fn test_weak_handle_does_not_keep_store_alive() {
    let store = EventState::default();
    let weak = store.downgrade();
    assert!(weak.upgrade().is_some());
    drop(store);
    assert!(weak.upgrade().is_none());
}
