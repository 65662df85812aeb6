//! Snapshot persistence
//!
//! Mirrors a declared subset of a store's state to a durable JSON file so the
//! store has a reasonable value to render before the first remote message.
//! Snapshots are a bootstrap cache, never an authority: the first inbound
//! patch supersedes whatever was rehydrated.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{SyncError, SyncResult};

/// Snapshot file format version. Snapshots with a different version are
/// discarded on load.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    saved_at: DateTime<Utc>,
    state: Value,
}

/// Durable snapshot storage for one store
///
/// Each store gets its own namespaced file, keyed independently of the
/// store key.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Create a snapshot store writing to `<dir>/<namespace>.json`
    pub fn new(dir: impl Into<PathBuf>, namespace: &str) -> Self {
        Self {
            path: Some(dir.into().join(format!("{namespace}.json"))),
        }
    }

    /// Create a disabled snapshot store: no durable read or write occurs
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Whether this store persists anything
    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Write a snapshot atomically (temp file + rename)
    pub fn save(&self, state: &Value) -> SyncResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            state: state.clone(),
        };
        let json = serde_json::to_string(&file).map_err(SyncError::encode)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SyncError::SnapshotWrite {
                path: path.clone(),
                source,
            })?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| SyncError::SnapshotWrite {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| SyncError::SnapshotWrite {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Read the snapshot back, if one exists.
    ///
    /// An unreadable or version-mismatched snapshot is discarded with a
    /// warning rather than failing construction.
    pub fn load(&self) -> SyncResult<Option<Value>> {
        let Some(ref path) = self.path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(path).map_err(|source| SyncError::SnapshotRead {
            path: path.clone(),
            source,
        })?;

        let file: SnapshotFile = match serde_json::from_str(&json) {
            Ok(f) => f,
            Err(e) => {
                warn!("Discarding unreadable snapshot at {:?}: {}", path, e);
                return Ok(None);
            }
        };

        if file.version != SNAPSHOT_VERSION {
            warn!(
                "Discarding snapshot at {:?} with unsupported version {}",
                path, file.version
            );
            return Ok(None);
        }

        Ok(Some(file.state))
    }

    /// Delete the snapshot file if present
    pub fn clear(&self) -> SyncResult<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if path.exists() {
            fs::remove_file(path).map_err(|source| SyncError::SnapshotWrite {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
