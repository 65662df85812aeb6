//! Wire envelope types
//!
//! Every frame on the transport is an [`Envelope`] tagged with the store key
//! it is addressed to. Envelopes are CBOR-encoded binary frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// A named remote action invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCall {
    /// Wire name of the action
    pub action_name: String,
    /// Parameter record matching the action's declared shape
    pub parameters: Value,
}

/// Messages exchanged with the remote side
///
/// `Patch` flows in both directions; `Action` and `RequestFullState` are
/// client-to-server only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Envelope {
    /// Partial or full state update for one store
    #[serde(rename = "patch")]
    Patch { key: String, payload: Value },

    /// Invocation of a remote-owned operation
    #[serde(rename = "action")]
    Action { key: String, call: ActionCall },

    /// Ask the remote side to re-emit the complete state for a store
    #[serde(rename = "requestFullState")]
    RequestFullState { key: String },
}

impl Envelope {
    /// Create a patch envelope
    pub fn patch(key: &str, payload: Value) -> Self {
        Envelope::Patch {
            key: key.to_string(),
            payload,
        }
    }

    /// Create an action envelope
    pub fn action(key: &str, call: ActionCall) -> Self {
        Envelope::Action {
            key: key.to_string(),
            call,
        }
    }

    /// Create a full-state request envelope
    pub fn request_full_state(key: &str) -> Self {
        Envelope::RequestFullState {
            key: key.to_string(),
        }
    }

    /// The store key this envelope is addressed to
    pub fn key(&self) -> &str {
        match self {
            Envelope::Patch { key, .. }
            | Envelope::Action { key, .. }
            | Envelope::RequestFullState { key } => key,
        }
    }

    /// Encode to CBOR bytes
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(SyncError::encode)?;
        Ok(bytes)
    }

    /// Decode from CBOR bytes
    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        ciborium::from_reader(bytes).map_err(SyncError::decode)
    }
}
