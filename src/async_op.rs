use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a path driven by `set_async`, as stored at `<path>.status`.
///
/// ```text
/// idle -> loading -> success | error | cancelled
///            ^----------------------------'   (a new set_async restarts)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsyncStatus {
    /// No operation has run at this path.
    #[default]
    Idle,
    Loading,
    Success,
    Error,
    Cancelled,
}

impl AsyncStatus {
    /// The string stored in the tree.
    pub fn as_str(self) -> &'static str {
        match self {
            AsyncStatus::Idle => "idle",
            AsyncStatus::Loading => "loading",
            AsyncStatus::Success => "success",
            AsyncStatus::Error => "error",
            AsyncStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status. Anything unrecognized, or a missing value,
    /// reads as [`AsyncStatus::Idle`].
    ///
    /// # Examples
    ///
    /// ```
    /// use eventstate::AsyncStatus;
    /// use serde_json::json;
    ///
    /// assert_eq!(AsyncStatus::from_value(Some(&json!("loading"))), AsyncStatus::Loading);
    /// assert_eq!(AsyncStatus::from_value(None), AsyncStatus::Idle);
    /// ```
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("loading") => AsyncStatus::Loading,
            Some("success") => AsyncStatus::Success,
            Some("error") => AsyncStatus::Error,
            Some("cancelled") => AsyncStatus::Cancelled,
            _ => AsyncStatus::Idle,
        }
    }

    /// Whether this status ends an operation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AsyncStatus::Success | AsyncStatus::Error | AsyncStatus::Cancelled
        )
    }
}

impl fmt::Display for AsyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AsyncStatus> for Value {
    fn from(status: AsyncStatus) -> Self {
        Value::from(status.as_str())
    }
}

/// Child path of an async-tracked path (`"<path>.status"` and friends).
pub(crate) fn field(path: &str, name: &str) -> String {
    format!("{path}.{name}")
}

/// The in-flight operation registered at one path.
#[derive(Debug)]
struct AsyncOp {
    id: u64,
    token: CancellationToken,
}

/// In-flight operations, at most one per path.
#[derive(Debug, Default)]
pub(crate) struct AsyncOps {
    next_id: u64,
    by_path: HashMap<String, AsyncOp>,
}

impl AsyncOps {
    /// Register a new operation at `path`, cancelling the one it replaces.
    /// Returns the new operation's id and token.
    pub(crate) fn start(&mut self, path: &str) -> (u64, CancellationToken) {
        let id = self.next_id;
        self.next_id += 1;
        let token = CancellationToken::new();
        let previous = self.by_path.insert(
            path.to_string(),
            AsyncOp {
                id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            log::debug!("eventstate: async '{path}' superseded operation {}", previous.id);
            previous.token.cancel();
        }
        (id, token)
    }

    /// Drop the record for `path` if it still belongs to operation `id`.
    /// Returns `false` if a newer operation or `cancel` already took it.
    pub(crate) fn finish(&mut self, path: &str, id: u64) -> bool {
        if self.by_path.get(path).is_some_and(|op| op.id == id) {
            self.by_path.remove(path);
            true
        } else {
            false
        }
    }

    /// Cancel and drop the operation at `path`. Returns `false` if nothing
    /// was in flight.
    pub(crate) fn cancel(&mut self, path: &str) -> bool {
        match self.by_path.remove(path) {
            Some(op) => {
                op.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel and drop every operation.
    pub(crate) fn cancel_all(&mut self) {
        for (_, op) in self.by_path.drain() {
            op.token.cancel();
        }
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_path.len()
    }
}
