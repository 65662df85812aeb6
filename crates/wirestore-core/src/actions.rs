//! Remote action delegates
//!
//! Actions are remote-owned operations invoked by name with a parameter
//! record. The set of actions for a remote entity is closed at build time:
//! [`remote_actions!`] generates an enum with one variant per action, so
//! invocation is exhaustively checked instead of stringly-typed.
//!
//! Invocation is fire-and-forget: there is no correlation ID and no reply
//! channel. Effects are observed later as ordinary inbound patches on the
//! relevant store. This mirrors the remote contract and is a documented
//! limitation, not an oversight.

use std::marker::PhantomData;

use serde::Serialize;

use crate::error::{SyncError, SyncResult};
use crate::message::{ActionCall, Envelope};
use crate::session::Session;

/// A member of a closed set of remote-owned operations.
///
/// Usually implemented via [`remote_actions!`]; the serialized form of the
/// value is the action's parameter record.
pub trait RemoteAction: Serialize {
    /// Wire name of this action
    fn name(&self) -> &'static str;
}

/// Delegate set for one remote entity, scoped to a store key.
///
/// Each invocation serializes `{key, actionName, parameters}` and sends it
/// through the bound session, returning without waiting for a remote reply.
pub struct ActionDelegates<A> {
    key: String,
    session: Session,
    _actions: PhantomData<fn(A)>,
}

impl<A: RemoteAction> ActionDelegates<A> {
    /// Bind a delegate set to `key` on `session`
    pub fn new(key: &str, session: &Session) -> Self {
        Self {
            key: key.to_string(),
            session: session.clone(),
            _actions: PhantomData,
        }
    }

    /// The store key scope of this delegate set
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Invoke a remote action.
    ///
    /// Never mutates any store synchronously. Fails with
    /// [`SyncError::NotConnected`] while the transport is down; there is no
    /// retry or queueing, the caller re-invokes after reconnection.
    pub fn invoke(&self, action: A) -> SyncResult<()> {
        let parameters = serde_json::to_value(&action).map_err(SyncError::encode)?;
        let call = ActionCall {
            action_name: action.name().to_string(),
            parameters,
        };
        self.session.send_envelope(Envelope::action(&self.key, call))
    }
}

/// Generate a closed enum of remote actions.
///
/// Each variant carries the action's parameter record as named fields and
/// maps to a wire name. Field names serialize in camelCase to match the
/// remote schema.
///
/// ```
/// use wirestore_core::remote_actions;
///
/// remote_actions! {
///     /// Actions owned by the channels service.
///     pub enum ChannelAction {
///         AddChannel("addChannel") { channel_id: String },
///         Refresh("refresh") {},
///     }
/// }
/// ```
#[macro_export]
macro_rules! remote_actions {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident($wire:literal) { $($field:ident : $ty:ty),* $(,)? }
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, ::serde::Serialize)]
        #[serde(untagged)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename_all = "camelCase")]
                $variant { $($field: $ty),* }
            ),*
        }

        impl $crate::actions::RemoteAction for $name {
            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant { .. } => $wire),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    remote_actions! {
        pub enum ChannelAction {
            AddChannel("addChannel") { channel_id: String, display_name: String },
            RemoveChannel("removeChannel") { channel_id: String },
            Refresh("refresh") {},
        }
    }

    #[test]
    fn test_wire_names() {
        let action = ChannelAction::AddChannel {
            channel_id: "c1".to_string(),
            display_name: "Main".to_string(),
        };
        assert_eq!(action.name(), "addChannel");
        assert_eq!(ChannelAction::Refresh {}.name(), "refresh");
    }

    #[test]
    fn test_parameter_record_shape() {
        let action = ChannelAction::AddChannel {
            channel_id: "c1".to_string(),
            display_name: "Main".to_string(),
        };
        let params = serde_json::to_value(&action).unwrap();
        // Untagged: just the camelCase parameter record, no variant tag.
        assert_eq!(
            params,
            json!({ "channelId": "c1", "displayName": "Main" })
        );
    }

    #[test]
    fn test_empty_parameters() {
        let params = serde_json::to_value(ChannelAction::Refresh {}).unwrap();
        assert_eq!(params, json!({}));
    }

    #[test]
    fn test_invoke_while_disconnected() {
        let session = Session::new("ws://localhost:9999/ws", "test");
        let delegates: ActionDelegates<ChannelAction> =
            ActionDelegates::new("Channels", &session);
        assert_eq!(delegates.key(), "Channels");

        let err = delegates
            .invoke(ChannelAction::RemoveChannel {
                channel_id: "c1".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::NotConnected));
    }
}
