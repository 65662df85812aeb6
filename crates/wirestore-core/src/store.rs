//! Synchronized store
//!
//! A typed local mirror of remote authoritative state, bound to one store
//! key on a shared [`Session`]. The store is the single source of truth for
//! its key's local state: only inbound patches from the session and explicit
//! local mutations may change it.

use std::sync::{Arc, Mutex, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::persist::SnapshotStore;
use crate::session::Session;
use crate::state;

/// Construction options for a synchronized store
pub struct StoreOptions {
    /// Durable snapshot storage; disabled by default
    pub snapshots: SnapshotStore,
    /// Top-level fields mirrored to the snapshot; empty persists everything
    pub persisted_fields: Vec<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            snapshots: SnapshotStore::disabled(),
            persisted_fields: Vec::new(),
        }
    }
}

struct StoreInner<T> {
    key: String,
    session: Session,
    state: Mutex<T>,
    watch_tx: watch::Sender<T>,
    // Held so the watch channel stays open with zero subscribers.
    watch_rx: watch::Receiver<T>,
    snapshots: SnapshotStore,
    persisted_fields: Vec<String>,
}

/// A synchronized state container.
///
/// Readable from the moment of construction: the initial value (possibly
/// rehydrated from a snapshot) renders before the first remote message
/// arrives. Cloning shares the same underlying state.
pub struct SyncedStore<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> std::fmt::Debug for SyncedStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedStore")
            .field("key", &self.inner.key)
            .finish_non_exhaustive()
    }
}

impl<T> Clone for SyncedStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> SyncedStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a store bound to `key` on `session`, without persistence
    pub fn new(initial: T, key: &str, session: &Session) -> SyncResult<Self> {
        Self::with_options(initial, key, session, StoreOptions::default())
    }

    /// Create a store with explicit options.
    ///
    /// If a snapshot exists it is merged over the initial value before
    /// registration, so the store is readable with the persisted state
    /// before any remote message. Fails with [`SyncError::DuplicateKey`]
    /// when the key is already bound on the session.
    pub fn with_options(
        initial: T,
        key: &str,
        session: &Session,
        options: StoreOptions,
    ) -> SyncResult<Self> {
        let mut state = initial;
        match options.snapshots.load() {
            Ok(Some(snapshot)) => match state::apply_patch(&state, &snapshot) {
                Ok(restored) => state = restored,
                Err(e) => warn!("Ignoring snapshot for store '{key}': {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to read snapshot for store '{key}': {e}"),
        }

        let (watch_tx, watch_rx) = watch::channel(state.clone());
        let inner = Arc::new(StoreInner {
            key: key.to_string(),
            session: session.clone(),
            state: Mutex::new(state),
            watch_tx,
            watch_rx,
            snapshots: options.snapshots,
            persisted_fields: options.persisted_fields,
        });

        // The session holds the handler for the session's lifetime; a weak
        // reference keeps dropped stores collectable.
        let weak: Weak<StoreInner<T>> = Arc::downgrade(&inner);
        session.register_store(
            key,
            Box::new(move |patch| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply_inbound(patch);
                }
            }),
        )?;

        Ok(Self { inner })
    }

    /// The store key this container owns
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Clone of the current state
    pub fn get(&self) -> T {
        self.inner.state.lock().unwrap().clone()
    }

    /// Subscribe to state changes.
    ///
    /// The receiver is notified once per applied patch or local mutation.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.watch_rx.clone()
    }

    /// Apply a local-only change, without contacting the remote side.
    ///
    /// Intended for instantaneous feedback before confirmation; the change
    /// is never rolled back, and the next inbound patch supersedes it.
    pub fn mutate<F: FnOnce(&mut T)>(&self, f: F) {
        let mut state = self.inner.state.lock().unwrap();
        f(&mut state);
        self.inner.persist(&state);
        let _ = self.inner.watch_tx.send(state.clone());
    }

    /// Push the current full state to the remote side.
    ///
    /// Does not block for acknowledgment; the remote side may overwrite it
    /// with its own derived state, arriving later as an inbound patch.
    /// Fails with [`SyncError::NotConnected`] when the transport is down;
    /// local state is not rolled back.
    pub fn push(&self) -> SyncResult<()> {
        let value = {
            let state = self.inner.state.lock().unwrap();
            serde_json::to_value(&*state).map_err(SyncError::encode)?
        };
        self.inner.session.send(&self.inner.key, value)
    }

    /// Request the complete authoritative state for this store.
    ///
    /// The snapshot arrives later as an ordinary inbound patch.
    pub fn fetch(&self) -> SyncResult<()> {
        self.inner.session.request_full_state(&self.inner.key)
    }
}

impl<T> StoreInner<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Merge one inbound patch, notifying observers exactly once.
    ///
    /// A patch that breaks the declared shape is dropped, the state stays
    /// unchanged, and the error is surfaced through the session's sink.
    fn apply_inbound(&self, patch: Value) {
        let mut state = self.state.lock().unwrap();
        match state::apply_patch(&*state, &patch) {
            Ok(next) => {
                *state = next;
                self.persist(&state);
                let _ = self.watch_tx.send(state.clone());
            }
            Err(e) => {
                self.session
                    .report_error(format!("store '{}': dropped inbound patch: {e}", self.key));
            }
        }
    }

    fn persist(&self, state: &T) {
        if !self.snapshots.is_enabled() {
            return;
        }
        let result = state::project(state, &self.persisted_fields)
            .and_then(|subset| self.snapshots.save(&subset));
        if let Err(e) = result {
            warn!("Failed to persist snapshot for store '{}': {e}", self.key);
        }
    }
}
