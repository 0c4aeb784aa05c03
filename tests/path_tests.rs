use eventstate::path;
use eventstate::GlobalNotify;
use serde_json::json;

#[test]
fn test_segments() {
    assert_eq!(path::segments("a"), vec!["a"]);
    assert_eq!(path::segments("a.b.c"), vec!["a", "b", "c"]);
    assert!(path::segments("").is_empty());
}

#[test]
fn test_ancestors_outermost_first() {
    let prefixes: Vec<&str> = path::ancestors("user.profile.address.city").collect();
    assert_eq!(prefixes, vec!["user", "user.profile", "user.profile.address"]);
}

#[test]
fn test_wildcard_key() {
    assert_eq!(path::wildcard_key("user"), "user.*");
}

#[test]
fn test_notification_keys_always() {
    assert_eq!(
        path::notification_keys("count", GlobalNotify::Always),
        vec!["count", "*"]
    );
    assert_eq!(
        path::notification_keys("a.b", GlobalNotify::Always),
        vec!["a.b", "a.*", "*"]
    );
}

#[test]
fn test_notification_keys_nested_only() {
    assert_eq!(
        path::notification_keys("count", GlobalNotify::NestedOnly),
        vec!["count"]
    );
    assert_eq!(
        path::notification_keys("a.b", GlobalNotify::NestedOnly),
        vec!["a.b", "a.*", "*"]
    );
}

#[test]
fn test_resolve() {
    let tree = json!({"a": {"b": [10, {"c": "deep"}]}, "n": 1});
    assert_eq!(path::resolve(&tree, "a.b.0"), Some(&json!(10)));
    assert_eq!(path::resolve(&tree, "a.b.1.c"), Some(&json!("deep")));
    assert_eq!(path::resolve(&tree, "a.b.9"), None);
    assert_eq!(path::resolve(&tree, "n.x"), None);
    assert_eq!(path::resolve(&tree, "missing"), None);
}
