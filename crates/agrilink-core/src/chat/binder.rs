//! Consultation-to-chat binder: lazily creates the one thread per
//! consultation on first access by either party.
//!
//! Concurrency contract: the persistence layer's uniqueness guarantee (a
//! partial unique index over active threads) is the arbiter. A caller that
//! loses the creation race re-reads and returns the winner's thread, so
//! concurrent first access by both parties observes the same thread id.

use agrilink_types::chat::{ChatThread, ThreadDetail};
use agrilink_types::error::{ChatError, RepositoryError};
use agrilink_types::identity::ParticipantInfo;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::chat::repository::ChatRepository;
use crate::consultation::repository::ConsultationRepository;
use crate::identity::repository::IdentityRepository;

/// Find-or-create glue between the consultation ledger and the chat store.
pub struct ThreadBinder<C, R, I>
where
    C: ConsultationRepository,
    R: ChatRepository,
    I: IdentityRepository,
{
    consultations: C,
    chat: R,
    identities: I,
}

impl<C, R, I> ThreadBinder<C, R, I>
where
    C: ConsultationRepository,
    R: ChatRepository,
    I: IdentityRepository,
{
    pub fn new(consultations: C, chat: R, identities: I) -> Self {
        Self {
            consultations,
            chat,
            identities,
        }
    }

    /// Return the consultation's active thread, creating it on first
    /// access. Only the consultation's two parties may call this; the
    /// binder does not gate on consultation status.
    pub async fn get_or_create_thread(
        &self,
        consultation_id: &Uuid,
        caller_id: &Uuid,
    ) -> Result<ThreadDetail, ChatError> {
        let consultation = self
            .consultations
            .get(consultation_id)
            .await?
            .ok_or(ChatError::ConsultationNotFound)?;

        if !consultation.is_party(caller_id) {
            return Err(ChatError::Forbidden);
        }

        if let Some(existing) = self.chat.find_active_thread(consultation_id).await? {
            return self.detail(existing).await;
        }

        // Participants are copied from the consultation at this instant.
        let now = Utc::now();
        let thread = ChatThread {
            id: Uuid::now_v7(),
            consultation_id: *consultation_id,
            farmer_id: consultation.farmer_id,
            agronomist_id: consultation.agronomist_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        match self.chat.create_thread(&thread).await {
            Ok(created) => {
                info!(thread_id = %created.id, consultation_id = %consultation_id, "chat thread created");
                self.detail(created).await
            }
            Err(RepositoryError::Conflict(_)) => {
                // Lost the race; the winner's thread is the thread.
                match self.chat.find_active_thread(consultation_id).await? {
                    Some(winner) => self.detail(winner).await,
                    None => Err(ChatError::Conflict(
                        "thread creation raced and no active thread remains".into(),
                    )),
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn detail(&self, thread: ChatThread) -> Result<ThreadDetail, ChatError> {
        let identities = self.identities.get_many(&thread.participant_ids()).await?;
        let participants: Vec<ParticipantInfo> =
            identities.iter().map(ParticipantInfo::from).collect();
        let messages = self.chat.get_messages(&thread.id).await?;
        Ok(ThreadDetail {
            thread,
            participants,
            messages,
        })
    }
}
