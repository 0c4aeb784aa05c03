//! Store configuration and builder.

use crate::plus::EventStatePlus;
use crate::store::EventState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// When the global `"*"` key is notified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalNotify {
    /// Every write notifies `"*"`, top-level paths included.
    #[default]
    Always,
    /// Only writes to nested paths (at least one `.`) notify `"*"`.
    NestedOnly,
}

/// Behavior switches for a store.
///
/// Deserializable with every field optional, so it can be read from an
/// application's own JSON config:
///
/// ```
/// use eventstate::{Config, GlobalNotify};
///
/// let config: Config = serde_json::from_str(r#"{"global_notify": "nested_only"}"#).unwrap();
/// assert_eq!(config.global_notify, GlobalNotify::NestedOnly);
/// assert!(config.isolate_handlers);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Global notification policy. Defaults to [`GlobalNotify::Always`].
    pub global_notify: GlobalNotify,

    /// Catch panics raised by handlers so sibling handlers still run.
    /// Defaults to `true`. When `false` a panicking handler unwinds through
    /// `set`.
    pub isolate_handlers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            global_notify: GlobalNotify::Always,
            isolate_handlers: true,
        }
    }
}

/// Builder for configuring an [`EventState`] before creating it.
///
/// # Examples
///
/// ```
/// use eventstate::{EventState, GlobalNotify};
/// use serde_json::json;
///
/// let store = EventState::builder(json!({"count": 0}))
///     .global_notify(GlobalNotify::NestedOnly)
///     .build();
/// assert_eq!(store.get("count").unwrap(), Some(json!(0)));
/// ```
#[derive(Debug)]
pub struct EventStateBuilder {
    initial: Value,
    config: Config,
}

impl EventStateBuilder {
    pub(crate) fn new(initial: Value) -> Self {
        EventStateBuilder {
            initial,
            config: Config::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the global notification policy.
    pub fn global_notify(mut self, policy: GlobalNotify) -> Self {
        self.config.global_notify = policy;
        self
    }

    /// Enable or disable handler panic isolation.
    pub fn isolate_handlers(mut self, isolate: bool) -> Self {
        self.config.isolate_handlers = isolate;
        self
    }

    /// Create the store.
    pub fn build(self) -> EventState {
        EventState::with_config(self.initial, self.config)
    }

    /// Create the store wrapped in the batching facade.
    pub fn build_plus(self) -> EventStatePlus {
        EventStatePlus::upgrade(self.build())
    }
}
