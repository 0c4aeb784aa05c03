//! Snapshot persistence for a store's tree.
//!
//! The store itself never touches disk. Persistence is a subscriber: attach
//! it with [`attach`] and every write saves the whole tree; restore it with
//! [`restore`] when the application starts.

use crate::error::Result;
use crate::path::GLOBAL_KEY;
use crate::store::{EventState, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A persisted copy of a store's tree.
///
/// The file is JSON and can be inspected directly:
///
/// ```text
/// $ cat state.json | jq .
/// {
///   "state": { "todos": { "items": [...] } },
///   "hash": "a3f2e1b09c4d..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Snapshot {
    /// The tree at the time of the snapshot.
    pub state: Value,

    /// Hex-encoded xxh64 hash of `state` in compact JSON form.
    /// Checked on load; a mismatch means the file was edited or torn.
    pub hash: String,
}

impl Snapshot {
    /// Capture `state` and compute its hash.
    ///
    /// # Errors
    ///
    /// Returns an error if `state` cannot be serialized.
    pub fn new(state: Value) -> Result<Self> {
        let hash = state_hash(&state)?;
        Ok(Snapshot { state, hash })
    }

    /// Whether `hash` matches `state`.
    pub fn is_intact(&self) -> bool {
        state_hash(&self.state).is_ok_and(|hash| hash == self.hash)
    }
}

/// Compute the xxh64 hash of `state` serialized as compact JSON,
/// hex-encoded.
///
/// # Errors
///
/// Returns an error if `state` cannot be serialized.
pub fn state_hash(state: &Value) -> Result<String> {
    let bytes = serde_json::to_vec(state)?;
    let hash = xxhash_rust::xxh64::xxh64(&bytes, 0);
    Ok(format!("{hash:016x}"))
}

/// Save `state` atomically to `path`.
///
/// Writes to a `.tmp` file first, syncs, then renames over `path`. If the
/// process dies mid-write the previous snapshot survives intact.
///
/// # Errors
///
/// Returns an error if serializing or any file operation fails.
pub fn save(path: &Path, state: &Value) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(&Snapshot::new(state.clone())?)?;

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_data()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Load the tree saved at `path`.
///
/// Returns `Ok(None)` if the file doesn't exist. A file that fails to parse
/// or whose hash doesn't match is logged and treated as missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn load(path: &Path) -> Result<Option<Value>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let snapshot: Snapshot = match serde_json::from_str(&contents) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("eventstate: snapshot '{}' is unreadable, ignoring: {e}", path.display());
            return Ok(None);
        }
    };

    if !snapshot.is_intact() {
        log::warn!("eventstate: snapshot '{}' hash mismatch, ignoring", path.display());
        return Ok(None);
    }
    Ok(Some(snapshot.state))
}

/// Delete the snapshot at `path` and its `.tmp` file if present.
///
/// Idempotent: missing files are not an error.
///
/// # Errors
///
/// Returns an error if a file exists but cannot be removed.
pub fn delete(path: &Path) -> Result<()> {
    for file in [path.to_path_buf(), path.with_extension("json.tmp")] {
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Create a store from the snapshot at `path`, or from `default` when there
/// is no usable snapshot.
///
/// # Errors
///
/// Returns an error if the snapshot exists but cannot be read.
pub fn restore(path: &Path, default: Value) -> Result<EventState> {
    let state = load(path)?.unwrap_or(default);
    Ok(EventState::new(state))
}

/// Save the whole tree to `path` after every write to `store`.
///
/// Writes that leave the value unchanged are not saved. The subscriber
/// holds only a weak handle, so it does not keep the store alive. Save
/// failures cannot reach the writer; they are logged.
///
/// With [`GlobalNotify::NestedOnly`](crate::GlobalNotify::NestedOnly),
/// writes to top-level paths do not reach the global key and are only
/// persisted with the next nested write.
///
/// # Errors
///
/// Returns an error if the store is destroyed.
pub fn attach(store: &EventState, path: impl Into<PathBuf>) -> Result<Subscription> {
    let path = path.into();
    let weak = store.downgrade();
    store.subscribe(GLOBAL_KEY, move |_, change| {
        if !change.is_modification() {
            return;
        }
        let Some(store) = weak.upgrade() else {
            return;
        };
        let Ok(Some(state)) = store.get("") else {
            return;
        };
        if let Err(e) = save(&path, &state) {
            log::error!(
                "eventstate: failed to persist '{}' after write to '{}': {e}",
                path.display(),
                change.path
            );
        }
    })
}
