//! wirestore core library
//!
//! Client-side state synchronization: typed local stores kept consistent
//! with an authoritative remote copy over a single multiplexed WebSocket
//! session.
//!
//! # Architecture
//!
//! - **Session**: one transport connection per client, shared by every
//!   store; demultiplexes inbound frames by store key and reconnects with
//!   exponential backoff.
//! - **SyncedStore**: an observable typed state value bound to one store
//!   key; merges server patches, supports optimistic local mutation, and
//!   can push its state or request a full resync.
//! - **ActionDelegates**: fire-and-forget invocation of remote-owned
//!   operations from a compile-time-closed action set.
//! - **SnapshotStore**: optional durable mirror of a declared state subset,
//!   rehydrated at construction as a bootstrap cache.
//!
//! # Quick Start
//!
//! ```text
//! let session = Session::from_config(&config);
//! session.connect();
//!
//! let store = SyncedStore::new(Dashboard::default(), "Dashboard", &session)?;
//! let mut updates = store.subscribe();
//!
//! // Remote patches arrive on the subscription; local edits push back:
//! store.mutate(|s| s.title = "Q3".into());
//! store.push()?;
//! ```
//!
//! # Modules
//!
//! - `session`: transport session and connection lifecycle
//! - `store`: synchronized state containers
//! - `actions`: remote action delegate sets
//! - `persist`: durable snapshot storage
//! - `state`: patch merge semantics
//! - `message`: wire envelope types
//! - `config`: client configuration

pub mod actions;
pub mod config;
pub mod error;
pub mod message;
pub mod persist;
pub mod session;
pub mod state;
pub mod store;

pub use actions::{ActionDelegates, RemoteAction};
pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use message::{ActionCall, Envelope};
pub use persist::SnapshotStore;
pub use session::{NotifySink, Session, SessionEvent, SessionStatus, StoreHandler};
pub use store::{StoreOptions, SyncedStore};
