//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the REST API and
//! the realtime handler. Services are generic over repository/gateway
//! traits, but AppState pins them to the concrete infra implementations.

use std::sync::Arc;

use agrilink_core::chat::binder::ThreadBinder;
use agrilink_core::chat::store::ChatStore;
use agrilink_core::consultation::service::ConsultationService;
use agrilink_core::identity::service::IdentityService;
use agrilink_core::presence::PresenceRegistry;
use agrilink_core::subscription::service::SubscriptionService;
use agrilink_infra::crypto::password::Argon2PasswordHasher;
use agrilink_infra::payment::ConfiguredGateway;
use agrilink_infra::sqlite::chat::SqliteChatRepository;
use agrilink_infra::sqlite::consultation::SqliteConsultationRepository;
use agrilink_infra::sqlite::identity::SqliteIdentityRepository;
use agrilink_infra::sqlite::pool::DatabasePool;
use agrilink_infra::sqlite::subscription::SqliteSubscriptionRepository;
use agrilink_infra::sqlite::transaction::SqliteTransactionRepository;
use agrilink_types::config::AppConfig;

use crate::http::extractors::auth::AuthKeys;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteIdentityService =
    IdentityService<SqliteIdentityRepository, SqliteTransactionRepository, Argon2PasswordHasher>;

pub type ConcreteConsultationService = ConsultationService<
    SqliteConsultationRepository,
    SqliteIdentityRepository,
    SqliteTransactionRepository,
    ConfiguredGateway,
>;

pub type ConcreteChatStore = ChatStore<SqliteChatRepository, SqliteIdentityRepository>;

pub type ConcreteThreadBinder =
    ThreadBinder<SqliteConsultationRepository, SqliteChatRepository, SqliteIdentityRepository>;

pub type ConcreteSubscriptionService =
    SubscriptionService<SqliteSubscriptionRepository, SqliteTransactionRepository, ConfiguredGateway>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub identity_service: Arc<ConcreteIdentityService>,
    pub consultation_service: Arc<ConcreteConsultationService>,
    pub chat_store: Arc<ConcreteChatStore>,
    pub thread_binder: Arc<ConcreteThreadBinder>,
    pub subscription_service: Arc<ConcreteSubscriptionService>,
    pub presence: Arc<PresenceRegistry>,
    pub auth: Arc<AuthKeys>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Wire services to their concrete repositories over one pool.
    pub fn build(
        config: &AppConfig,
        db_pool: DatabasePool,
        auth: AuthKeys,
    ) -> anyhow::Result<Self> {
        let gateway = ConfiguredGateway::from_config(&config.payment)
            .map_err(|e| anyhow::anyhow!("payment gateway config: {e}"))?;

        let identity_service = IdentityService::new(
            SqliteIdentityRepository::new(db_pool.clone()),
            SqliteTransactionRepository::new(db_pool.clone()),
            Argon2PasswordHasher::new(),
        );

        let consultation_service = ConsultationService::new(
            SqliteConsultationRepository::new(db_pool.clone()),
            SqliteIdentityRepository::new(db_pool.clone()),
            SqliteTransactionRepository::new(db_pool.clone()),
            gateway.clone(),
            config.payment.fee_percent,
        );

        let chat_store = ChatStore::new(
            SqliteChatRepository::new(db_pool.clone()),
            SqliteIdentityRepository::new(db_pool.clone()),
        );

        let thread_binder = ThreadBinder::new(
            SqliteConsultationRepository::new(db_pool.clone()),
            SqliteChatRepository::new(db_pool.clone()),
            SqliteIdentityRepository::new(db_pool.clone()),
        );

        let subscription_service = SubscriptionService::new(
            SqliteSubscriptionRepository::new(db_pool.clone()),
            SqliteTransactionRepository::new(db_pool.clone()),
            gateway,
        );

        Ok(Self {
            identity_service: Arc::new(identity_service),
            consultation_service: Arc::new(consultation_service),
            chat_store: Arc::new(chat_store),
            thread_binder: Arc::new(thread_binder),
            subscription_service: Arc::new(subscription_service),
            presence: Arc::new(PresenceRegistry::new()),
            auth: Arc::new(auth),
            db_pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use agrilink_core::consultation::service::NewConsultation;
    use agrilink_core::identity::service::NewIdentity;
    use agrilink_core::presence::ConnectionHandle;
    use agrilink_types::chat::MessageType;
    use agrilink_types::consultation::ConsultationStatus;
    use agrilink_types::event::ServerEvent;
    use agrilink_types::identity::{Identity, Role};
    use axum::extract::{Path, State};
    use axum::Json;
    use tokio::sync::mpsc;

    use crate::http::extractors::auth::AuthIdentity;
    use crate::http::handlers::chat::{post_message, PostMessageRequest};

    async fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);

        let db_pool = DatabasePool::new(&url).await.unwrap();
        let config = AppConfig::default(); // mock gateway, 10% fee
        AppState::build(&config, db_pool, AuthKeys::new("test-secret", 60)).unwrap()
    }

    async fn register(state: &AppState, name: &str, role: Role) -> Identity {
        state
            .identity_service
            .register(NewIdentity {
                name: name.to_string(),
                email: format!("{}@example.com", uuid::Uuid::now_v7()),
                password: "hunter2hunter2".to_string(),
                role,
                phone: None,
            })
            .await
            .unwrap()
    }

    /// The full marketplace flow: book, pay, bind a chat thread from both
    /// sides, deliver a message in realtime, accumulate read receipts.
    #[tokio::test]
    async fn end_to_end_consultation_chat_flow() {
        let state = test_state().await;
        let farmer = register(&state, "Kofi Mensah", Role::Farmer).await;
        let agronomist = register(&state, "Amara Diallo", Role::Agronomist).await;

        // Farmer books a consultation at 2000 cents.
        let (consultation, checkout) = state
            .consultation_service
            .create(
                farmer.id,
                NewConsultation {
                    agronomist_id: agronomist.id,
                    topic: "wilting maize".to_string(),
                    description: None,
                    scheduled_at: None,
                    price: 2000,
                },
            )
            .await
            .unwrap();
        assert_eq!(consultation.status, ConsultationStatus::Pending);
        assert!(checkout.id.starts_with("mock_session_"));

        // Mock capture moves it to paid and credits 2000 - 10% = 1800.
        let paid = state
            .consultation_service
            .capture_mock(&consultation.id, &farmer.id, Role::Farmer)
            .await
            .unwrap();
        assert_eq!(paid.status, ConsultationStatus::Paid);
        assert!(paid.payment.is_some());
        let credited = state.identity_service.get(&agronomist.id).await.unwrap();
        assert_eq!(credited.wallet.balance, 1800);

        // Both parties bind the chat; one thread, same id.
        let from_farmer = state
            .thread_binder
            .get_or_create_thread(&consultation.id, &farmer.id)
            .await
            .unwrap();
        let from_agronomist = state
            .thread_binder
            .get_or_create_thread(&consultation.id, &agronomist.id)
            .await
            .unwrap();
        assert_eq!(from_farmer.thread.id, from_agronomist.thread.id);
        assert_eq!(from_farmer.participants.len(), 2);
        let thread_id = from_farmer.thread.id;

        // The agronomist's realtime connection joins the thread room.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = ConnectionHandle::new(tx);
        state
            .presence
            .register_identity(agronomist.id, connection.clone());
        state.presence.subscribe_to_thread(&connection, thread_id);
        assert!(state.presence.is_online(&agronomist.id));

        // Farmer posts through the handler; fan-out delivers `newMessage`.
        let response = post_message(
            State(state.clone()),
            AuthIdentity {
                id: farmer.id,
                role: Role::Farmer,
            },
            Path(thread_id.to_string()),
            Json(PostMessageRequest {
                content: "hello".to_string(),
                message_type: MessageType::Text,
                file_ref: None,
            }),
        )
        .await
        .unwrap();
        let stored = response.0.data.unwrap();
        assert_eq!(stored.content, "hello");
        assert_eq!(stored.sender_id, farmer.id);

        match rx.try_recv().unwrap() {
            ServerEvent::NewMessage { message } => {
                assert_eq!(message.content, "hello");
                assert_eq!(message.sender_id, farmer.id);
            }
            other => panic!("expected newMessage, got {other:?}"),
        }

        // Mark-read by the agronomist: receipts now hold both parties.
        state
            .chat_store
            .mark_read(&thread_id, &agronomist.id)
            .await
            .unwrap();
        let detail = state
            .chat_store
            .get_thread(&thread_id, &agronomist.id)
            .await
            .unwrap();
        assert_eq!(detail.messages.len(), 1);
        assert!(detail.messages[0].is_read_by(&farmer.id));
        assert!(detail.messages[0].is_read_by(&agronomist.id));
    }

    /// Tokens issued by the state's keys resolve back to the caller.
    #[tokio::test]
    async fn issued_tokens_resolve_identity_and_role() {
        let state = test_state().await;
        let agronomist = register(&state, "Amara Diallo", Role::Agronomist).await;

        let token = state.auth.sign(&agronomist).unwrap();
        let resolved = state.auth.verify(&token).unwrap();
        assert_eq!(resolved.id, agronomist.id);
        assert_eq!(resolved.role, Role::Agronomist);
    }
}
