use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The detail passed to every handler when a path is written.
///
/// Exact, wildcard and global handlers all receive the same record: `path`
/// is the path that was written (not the prefix a wildcard handler
/// subscribed to) and `value` is the value written there.
///
/// `Change` serializes to a compact JSON object, so telemetry or
/// state-inspector subscribers can log it directly. `old_value` is omitted
/// when the path did not exist before the write.
///
/// # Examples
///
/// ```
/// use eventstate::Change;
/// use serde_json::json;
///
/// let change = Change::new("user.name", json!("Bob"), Some(json!("Ann")));
/// assert_eq!(change.path, "user.name");
/// assert_eq!(change.value, "Bob");
/// assert_eq!(change.old_value, Some(json!("Ann")));
///
/// let line = serde_json::to_string(&change).unwrap();
/// assert_eq!(line, r#"{"path":"user.name","value":"Bob","oldValue":"Ann"}"#);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct Change {
    /// Dot-path that was written.
    pub path: String,

    /// The value now stored at `path`.
    pub value: Value,

    /// The value `path` held before the write, or `None` if it was absent.
    ///
    /// Serialized as `"oldValue"`.
    #[serde(
        rename = "oldValue",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub old_value: Option<Value>,
}

impl Change {
    /// Create a change record.
    pub fn new(path: impl Into<String>, value: Value, old_value: Option<Value>) -> Self {
        Change {
            path: path.into(),
            value,
            old_value,
        }
    }

    /// Returns `true` if the write replaced an existing value with a
    /// different one, or created the path.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventstate::Change;
    /// use serde_json::json;
    ///
    /// assert!(Change::new("a", json!(1), None).is_modification());
    /// assert!(!Change::new("a", json!(1), Some(json!(1))).is_modification());
    /// ```
    pub fn is_modification(&self) -> bool {
        self.old_value.as_ref() != Some(&self.value)
    }
}
