use thiserror::Error;

use crate::consultation::ConsultationStatus;

/// Errors from repository operations (used by trait definitions in agrilink-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to identity and account operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity not found")]
    NotFound,

    #[error("email '{0}' already in use")]
    EmailTaken(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("operation not allowed for this role")]
    Forbidden,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("password hashing error: {0}")]
    Hashing(String),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors related to consultation operations.
#[derive(Debug, Error)]
pub enum ConsultationError {
    #[error("consultation not found")]
    NotFound,

    #[error("caller is not a party to this consultation")]
    Forbidden,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    #[error("payment error: {0}")]
    Payment(String),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors related to chat threads and messages.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat thread not found")]
    ThreadNotFound,

    #[error("consultation not found")]
    ConsultationNotFound,

    #[error("caller is not a participant of this thread")]
    Forbidden,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors related to subscriptions.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("only farmers can subscribe")]
    Forbidden,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("payment error: {0}")]
    Payment(String),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Errors from the payment gateway collaborator.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("gateway error: {0}")]
    Gateway(String),
}
