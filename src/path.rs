//! Dot-path addressing over a JSON state tree.
//!
//! A path such as `"user.profile.name"` names a location in the tree; the
//! empty path names the root. Object members are addressed by key, array
//! elements by decimal index (`"todos.items.0"`).
//!
//! Subscription keys share the same syntax: an exact path, an ancestor
//! wildcard `"<prefix>.*"`, or the global key `"*"`.

use crate::config::GlobalNotify;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Subscription key that matches every write.
pub const GLOBAL_KEY: &str = "*";

/// Suffix that turns an ancestor path into a wildcard subscription key.
pub const WILDCARD_SUFFIX: &str = ".*";

/// Split a path into its segments. The empty path has no segments.
///
/// # Examples
///
/// ```
/// use eventstate::path;
///
/// assert_eq!(path::segments("user.profile.name"), vec!["user", "profile", "name"]);
/// assert!(path::segments("").is_empty());
/// ```
pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Iterate the proper ancestor prefixes of `path`, outermost first.
///
/// # Examples
///
/// ```
/// use eventstate::path;
///
/// let prefixes: Vec<&str> = path::ancestors("a.b.c").collect();
/// assert_eq!(prefixes, vec!["a", "a.b"]);
/// assert_eq!(path::ancestors("count").count(), 0);
/// ```
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    path.match_indices('.').map(move |(i, _)| &path[..i])
}

/// The wildcard subscription key for descendants of `prefix`.
pub fn wildcard_key(prefix: &str) -> String {
    format!("{prefix}{WILDCARD_SUFFIX}")
}

/// The subscription keys notified by a write to `path`, in dispatch order:
/// the exact path, one wildcard key per ancestor (outermost first), then the
/// global key.
///
/// Under [`GlobalNotify::NestedOnly`] the global key is left out for
/// single-segment paths.
///
/// # Examples
///
/// ```
/// use eventstate::{path, GlobalNotify};
///
/// assert_eq!(
///     path::notification_keys("user.profile.name", GlobalNotify::Always),
///     vec!["user.profile.name", "user.*", "user.profile.*", "*"],
/// );
/// assert_eq!(path::notification_keys("count", GlobalNotify::NestedOnly), vec!["count"]);
/// ```
pub fn notification_keys(path: &str, policy: GlobalNotify) -> Vec<String> {
    let mut keys = vec![path.to_string()];
    keys.extend(ancestors(path).map(wildcard_key));
    if policy == GlobalNotify::Always || path.contains('.') {
        keys.push(GLOBAL_KEY.to_string());
    }
    keys
}

/// Resolve `path` against `root`.
///
/// Returns `None` as soon as a segment is missing or an intermediate value
/// is not a container. Never fails.
///
/// # Examples
///
/// ```
/// use eventstate::path;
/// use serde_json::json;
///
/// let tree = json!({"todos": {"items": [{"text": "Buy milk"}]}});
/// assert_eq!(path::resolve(&tree, "todos.items.0.text"), Some(&json!("Buy milk")));
/// assert_eq!(path::resolve(&tree, "todos.items.0.text.len"), None);
/// assert_eq!(path::resolve(&tree, ""), Some(&tree));
/// ```
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(root, |node, seg| match node {
            Value::Object(map) => map.get(seg),
            Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Write `value` at `path`, creating intermediate objects on demand, and
/// return the value previously stored there.
///
/// Any intermediate that is neither an object nor an array is replaced with
/// an empty object. Array segments must be an existing index or the index
/// one past the end (append). The tree is left untouched when the path is
/// rejected.
pub(crate) fn assign(root: &mut Value, path: &str, value: Value) -> Result<Option<Value>> {
    let segs = segments(path);
    let Some((last, parents)) = segs.split_last() else {
        return Ok(Some(std::mem::replace(root, value)));
    };

    check_writable(root, &segs, path)?;

    let mut node = root;
    for seg in parents {
        node = slot_mut(node, seg, path)?;
    }
    put(node, last, value, path)
}

fn check_writable(root: &Value, segs: &[&str], path: &str) -> Result<()> {
    let mut node = root;
    for seg in segs {
        let next = match node {
            Value::Object(map) => map.get(*seg),
            Value::Array(items) => {
                let idx = array_index(items, seg, path)?;
                items.get(idx)
            }
            _ => None,
        };
        match next {
            Some(child) => node = child,
            // Everything below a missing or scalar node is created fresh.
            None => return Ok(()),
        }
    }
    Ok(())
}

fn slot_mut<'a>(node: &'a mut Value, seg: &str, path: &str) -> Result<&'a mut Value> {
    match node {
        Value::Object(map) => Ok(map.entry(seg).or_insert(Value::Null)),
        Value::Array(items) => {
            let idx = array_index(items, seg, path)?;
            if idx == items.len() {
                items.push(Value::Null);
            }
            Ok(&mut items[idx])
        }
        other => {
            *other = Value::Object(Map::new());
            slot_mut(other, seg, path)
        }
    }
}

fn put(node: &mut Value, seg: &str, value: Value, path: &str) -> Result<Option<Value>> {
    match node {
        Value::Object(map) => Ok(map.insert(seg.to_string(), value)),
        Value::Array(items) => {
            let idx = array_index(items, seg, path)?;
            if idx == items.len() {
                items.push(value);
                Ok(None)
            } else {
                Ok(Some(std::mem::replace(&mut items[idx], value)))
            }
        }
        other => {
            *other = Value::Object(Map::new());
            put(other, seg, value, path)
        }
    }
}

fn array_index(items: &[Value], seg: &str, path: &str) -> Result<usize> {
    let idx = seg.parse::<usize>().map_err(|_| Error::InvalidPath {
        path: path.to_string(),
        reason: format!("'{seg}' is not an array index"),
    })?;
    if idx > items.len() {
        return Err(Error::InvalidPath {
            path: path.to_string(),
            reason: format!("index {idx} is past the end of an array of length {}", items.len()),
        });
    }
    Ok(idx)
}
