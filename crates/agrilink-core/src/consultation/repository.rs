//! ConsultationRepository trait definition.

use agrilink_types::consultation::{Consultation, PaymentRecord};
use agrilink_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for consultation persistence.
///
/// Implementations live in agrilink-infra (e.g., `SqliteConsultationRepository`).
pub trait ConsultationRepository: Send + Sync {
    /// Insert a new consultation.
    fn create(
        &self,
        consultation: &Consultation,
    ) -> impl std::future::Future<Output = Result<Consultation, RepositoryError>> + Send;

    /// Get a consultation by its unique ID.
    fn get(
        &self,
        consultation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Consultation>, RepositoryError>> + Send;

    /// List consultations where the identity is the farmer, newest first.
    fn list_for_farmer(
        &self,
        farmer_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Consultation>, RepositoryError>> + Send;

    /// List consultations where the identity is the agronomist, newest first.
    fn list_for_agronomist(
        &self,
        agronomist_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Consultation>, RepositoryError>> + Send;

    /// List every consultation (admin view), newest first.
    fn list_all(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Consultation>, RepositoryError>> + Send;

    /// Persist status and notes changes.
    fn update(
        &self,
        consultation: &Consultation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Conditionally move `pending -> paid`, storing the payment record.
    ///
    /// Returns `false` when the consultation was no longer pending (a
    /// concurrent capture won); the row is then left untouched.
    fn mark_paid(
        &self,
        consultation_id: &Uuid,
        payment: &PaymentRecord,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
