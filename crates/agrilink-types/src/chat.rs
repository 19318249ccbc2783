//! Chat thread, message, and read-receipt types.
//!
//! Each thread is bound to exactly one consultation and carries exactly two
//! participants, copied from the consultation when the thread is created.
//! Messages are immutable once stored; only their read-receipt set grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::identity::ParticipantInfo;

/// Kind of message payload.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (message_type IN ('text', 'file'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    File,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Text => write!(f, "text"),
            MessageType::File => write!(f, "file"),
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "file" => Ok(MessageType::File),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

/// A single read receipt. A reader appears at most once per message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub reader_id: Uuid,
    pub read_at: DateTime<Utc>,
}

/// A message within a chat thread.
///
/// Ids are UUID v7, so insertion order and id order coincide. The sender's
/// own receipt is created together with the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub file_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_by: Vec<ReadReceipt>,
}

impl ChatMessage {
    /// Whether `reader_id` already has a receipt on this message.
    pub fn is_read_by(&self, reader_id: &Uuid) -> bool {
        self.read_by.iter().any(|r| r.reader_id == *reader_id)
    }
}

/// A chat thread bound to one consultation.
///
/// Never deleted, only deactivated. At most one active thread exists per
/// consultation (enforced by a partial unique index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub farmer_id: Uuid,
    pub agronomist_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatThread {
    pub fn is_participant(&self, identity_id: &Uuid) -> bool {
        self.farmer_id == *identity_id || self.agronomist_id == *identity_id
    }

    pub fn participant_ids(&self) -> [Uuid; 2] {
        [self.farmer_id, self.agronomist_id]
    }
}

/// A thread with participant display info and full message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ChatThread,
    pub participants: Vec<ParticipantInfo>,
    pub messages: Vec<ChatMessage>,
}

/// A thread listing entry: participants plus the most recent message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    #[serde(flatten)]
    pub thread: ChatThread,
    pub participants: Vec<ParticipantInfo>,
    pub last_message: Option<ChatMessage>,
}
