//! SubscriptionRepository trait definition.

use agrilink_types::error::RepositoryError;
use agrilink_types::subscription::Subscription;
use uuid::Uuid;

/// Repository trait for subscription persistence.
///
/// Implementations live in agrilink-infra (e.g., `SqliteSubscriptionRepository`).
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a new subscription.
    fn create(
        &self,
        subscription: &Subscription,
    ) -> impl std::future::Future<Output = Result<Subscription, RepositoryError>> + Send;

    /// List a farmer's subscriptions, newest first.
    fn list_for(
        &self,
        farmer_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Subscription>, RepositoryError>> + Send;
}
