//! Realtime wire contracts.
//!
//! Both directions are JSON text frames tagged with `type`, camelCase on
//! the wire. Unknown or malformed client frames are logged and dropped by
//! the server; the connection stays open.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ChatMessage;

/// Frame sent by a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Register this connection as the identity's live connection.
    /// Required before any targeted events are delivered.
    #[serde(rename_all = "camelCase")]
    Join { identity_id: Uuid },

    /// Subscribe this connection to a thread's events.
    #[serde(rename_all = "camelCase")]
    JoinChat { thread_id: Uuid },

    /// Unsubscribe this connection from a thread.
    #[serde(rename_all = "camelCase")]
    LeaveChat { thread_id: Uuid },

    /// Ephemeral typing indicator, relayed best-effort to the thread.
    #[serde(rename_all = "camelCase")]
    Typing { thread_id: Uuid, is_typing: bool },

    /// Client-side delivery acknowledgment, relayed to the thread.
    #[serde(rename_all = "camelCase")]
    MessageDelivered { thread_id: Uuid, message_id: Uuid },
}

/// Frame pushed to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A message committed to a thread this connection subscribes to.
    NewMessage { message: ChatMessage },

    /// An identity came online (registered a connection).
    #[serde(rename_all = "camelCase")]
    UserOnline { identity_id: Uuid },

    /// An identity went offline (its current connection closed).
    #[serde(rename_all = "camelCase")]
    UserOffline { identity_id: Uuid },

    /// Relayed typing indicator. No ordering guarantee relative to
    /// messages; clients expire stale indicators after ~1s.
    #[serde(rename_all = "camelCase")]
    UserTyping { identity_id: Uuid, is_typing: bool },

    /// Relayed delivery acknowledgment.
    #[serde(rename_all = "camelCase")]
    MessageDelivered {
        message_id: Uuid,
        delivered_to: Uuid,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageType;
    use chrono::Utc;

    #[test]
    fn test_client_event_wire_names() {
        let id = Uuid::now_v7();
        let json = serde_json::to_value(&ClientEvent::JoinChat { thread_id: id }).unwrap();
        assert_eq!(json["type"], "joinChat");
        assert_eq!(json["threadId"], id.to_string());

        let json = serde_json::to_value(&ClientEvent::Typing {
            thread_id: id,
            is_typing: true,
        })
        .unwrap();
        assert_eq!(json["type"], "typing");
        assert_eq!(json["isTyping"], true);
    }

    #[test]
    fn test_client_event_parse() {
        let id = Uuid::now_v7();
        let raw = format!(r#"{{"type":"join","identityId":"{id}"}}"#);
        let event: ClientEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(event, ClientEvent::Join { identity_id: id });
    }

    #[test]
    fn test_malformed_client_event_is_error() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"selfDestruct"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }

    #[test]
    fn test_server_event_wire_names() {
        let identity_id = Uuid::now_v7();
        let json = serde_json::to_value(&ServerEvent::UserOnline { identity_id }).unwrap();
        assert_eq!(json["type"], "userOnline");
        assert_eq!(json["identityId"], identity_id.to_string());

        let message = ChatMessage {
            id: Uuid::now_v7(),
            thread_id: Uuid::now_v7(),
            sender_id: identity_id,
            content: "hello".to_string(),
            message_type: MessageType::Text,
            file_ref: None,
            created_at: Utc::now(),
            read_by: vec![],
        };
        let json = serde_json::to_value(&ServerEvent::NewMessage { message }).unwrap();
        assert_eq!(json["type"], "newMessage");
        assert_eq!(json["message"]["content"], "hello");
    }

    #[test]
    fn test_message_delivered_roundtrip() {
        let event = ServerEvent::MessageDelivered {
            message_id: Uuid::now_v7(),
            delivered_to: Uuid::now_v7(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"deliveredTo\""));
        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ServerEvent::MessageDelivered { .. }));
    }
}
