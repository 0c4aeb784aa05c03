//! A JSON state tree with dot-path `get`/`set`, path-based subscriptions,
//! write batching and async fetch state.

mod async_op;
mod change;
mod config;
mod error;
mod listeners;
pub mod path;
pub mod persist;
mod plus;
mod store;
mod typed;

pub use async_op::AsyncStatus;
pub use change::Change;
pub use config::{Config, EventStateBuilder, GlobalNotify};
pub use error::{BoxError, Error, Result};
pub use listeners::Handler;
pub use plus::EventStatePlus;
pub use store::{EventState, StateStore, Subscription, WeakEventState};
pub use typed::TypedState;
pub use tokio_util::sync::CancellationToken;
