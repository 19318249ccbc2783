//! Chat store: message append, read receipts, and thread listings.

use agrilink_types::chat::{
    ChatMessage, ChatThread, MessageType, ReadReceipt, ThreadDetail, ThreadSummary,
};
use agrilink_types::error::ChatError;
use agrilink_types::identity::ParticipantInfo;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::identity::repository::IdentityRepository;

/// Orchestrates message persistence over a thread's ordered sequence.
///
/// Party membership is the only access gate; consultation status is a
/// presentation concern and is not re-checked here.
pub struct ChatStore<R, I>
where
    R: ChatRepository,
    I: IdentityRepository,
{
    repo: R,
    identities: I,
}

impl<R, I> ChatStore<R, I>
where
    R: ChatRepository,
    I: IdentityRepository,
{
    pub fn new(repo: R, identities: I) -> Self {
        Self { repo, identities }
    }

    async fn load_thread(&self, thread_id: &Uuid) -> Result<ChatThread, ChatError> {
        self.repo
            .get_thread(thread_id)
            .await?
            .ok_or(ChatError::ThreadNotFound)
    }

    async fn participants_of(&self, thread: &ChatThread) -> Result<Vec<ParticipantInfo>, ChatError> {
        let identities = self.identities.get_many(&thread.participant_ids()).await?;
        Ok(identities.iter().map(ParticipantInfo::from).collect())
    }

    /// Append a message to a thread. The sender's own receipt is created
    /// with the message; the stored message is returned for fan-out.
    pub async fn append_message(
        &self,
        thread_id: &Uuid,
        sender_id: &Uuid,
        content: String,
        message_type: MessageType,
        file_ref: Option<String>,
    ) -> Result<ChatMessage, ChatError> {
        let thread = self.load_thread(thread_id).await?;
        if !thread.is_participant(sender_id) {
            return Err(ChatError::Forbidden);
        }
        if content.is_empty() && message_type == MessageType::Text {
            return Err(ChatError::Validation("message content is empty".into()));
        }
        if message_type == MessageType::File && file_ref.is_none() {
            return Err(ChatError::Validation(
                "file messages need a file reference".into(),
            ));
        }

        let now = Utc::now();
        let message = ChatMessage {
            id: Uuid::now_v7(),
            thread_id: *thread_id,
            sender_id: *sender_id,
            content,
            message_type,
            file_ref,
            created_at: now,
            read_by: vec![ReadReceipt {
                reader_id: *sender_id,
                read_at: now,
            }],
        };

        self.repo.append_message(&message).await?;
        Ok(message)
    }

    /// Add receipts for `reader_id` to every unread message in the thread.
    /// Re-invoking has no additional effect.
    pub async fn mark_read(&self, thread_id: &Uuid, reader_id: &Uuid) -> Result<u64, ChatError> {
        let thread = self.load_thread(thread_id).await?;
        if !thread.is_participant(reader_id) {
            return Err(ChatError::Forbidden);
        }

        let added = self.repo.mark_read(thread_id, reader_id, Utc::now()).await?;
        debug!(thread_id = %thread_id, reader_id = %reader_id, added, "messages marked read");
        Ok(added)
    }

    /// Active threads for an identity, most recent activity first, each
    /// with its latest message summarized.
    pub async fn list_threads_for(
        &self,
        identity_id: &Uuid,
    ) -> Result<Vec<ThreadSummary>, ChatError> {
        let threads = self.repo.list_threads_for(identity_id).await?;

        let mut summaries = Vec::with_capacity(threads.len());
        for thread in threads {
            let participants = self.participants_of(&thread).await?;
            let last_message = self.repo.get_last_message(&thread.id).await?;
            summaries.push(ThreadSummary {
                thread,
                participants,
                last_message,
            });
        }
        Ok(summaries)
    }

    /// A thread with full history, for one of its participants.
    pub async fn get_thread(
        &self,
        thread_id: &Uuid,
        caller_id: &Uuid,
    ) -> Result<ThreadDetail, ChatError> {
        let thread = self.load_thread(thread_id).await?;
        if !thread.is_participant(caller_id) {
            return Err(ChatError::Forbidden);
        }

        let participants = self.participants_of(&thread).await?;
        let messages = self.repo.get_messages(thread_id).await?;
        Ok(ThreadDetail {
            thread,
            participants,
            messages,
        })
    }
}
