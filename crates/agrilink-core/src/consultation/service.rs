//! Consultation service: booking, listing, status transitions, payment
//! capture and payout.

use std::collections::HashMap;

use agrilink_types::consultation::{Consultation, ConsultationStatus, PaymentRecord};
use agrilink_types::error::ConsultationError;
use agrilink_types::identity::Role;
use agrilink_types::transaction::{Transaction, TransactionKind};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::consultation::repository::ConsultationRepository;
use crate::identity::repository::IdentityRepository;
use crate::payment::{CapturedPayment, CheckoutSession, PaymentGateway};
use crate::transaction::TransactionRepository;

/// Platform fee in integer minor units, round-half-up.
///
/// `platform_fee(2000, 10) == 200`, `platform_fee(1005, 10) == 101`.
pub fn platform_fee(price: i64, fee_percent: u32) -> i64 {
    (price * i64::from(fee_percent) + 50) / 100
}

/// Input for booking a consultation.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub agronomist_id: Uuid,
    pub topic: String,
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Integer minor units (cents).
    pub price: i64,
}

/// Orchestrates the consultation lifecycle.
///
/// Holds the payment gateway because both booking (checkout session) and
/// mock capture go through it.
pub struct ConsultationService<C, I, T, G>
where
    C: ConsultationRepository,
    I: IdentityRepository,
    T: TransactionRepository,
    G: PaymentGateway,
{
    repo: C,
    identities: I,
    transactions: T,
    gateway: G,
    fee_percent: u32,
}

impl<C, I, T, G> ConsultationService<C, I, T, G>
where
    C: ConsultationRepository,
    I: IdentityRepository,
    T: TransactionRepository,
    G: PaymentGateway,
{
    pub fn new(repo: C, identities: I, transactions: T, gateway: G, fee_percent: u32) -> Self {
        Self {
            repo,
            identities,
            transactions,
            gateway,
            fee_percent,
        }
    }

    /// Book a consultation with an agronomist. Returns the pending record
    /// and a checkout session for the client to complete payment.
    pub async fn create(
        &self,
        farmer_id: Uuid,
        input: NewConsultation,
    ) -> Result<(Consultation, CheckoutSession), ConsultationError> {
        if input.topic.trim().is_empty() {
            return Err(ConsultationError::Validation(
                "topic must not be empty".into(),
            ));
        }
        if input.price <= 0 {
            return Err(ConsultationError::Validation(
                "price must be positive".into(),
            ));
        }
        if input.agronomist_id == farmer_id {
            return Err(ConsultationError::Validation(
                "farmer and agronomist must differ".into(),
            ));
        }

        let agronomist = self.identities.get(&input.agronomist_id).await?;
        match agronomist {
            Some(identity) if identity.role == Role::Agronomist => {}
            _ => {
                return Err(ConsultationError::Validation(
                    "agronomist not found".into(),
                ));
            }
        }

        let now = Utc::now();
        let consultation = Consultation {
            id: Uuid::now_v7(),
            farmer_id,
            agronomist_id: input.agronomist_id,
            topic: input.topic.trim().to_string(),
            description: input.description,
            scheduled_at: input.scheduled_at,
            price: input.price,
            currency: "usd".to_string(),
            status: ConsultationStatus::Pending,
            payment: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&consultation).await?;

        let mut metadata = HashMap::new();
        metadata.insert("consultation_id".to_string(), created.id.to_string());
        let checkout = self
            .gateway
            .create_checkout_session(created.price, &created.currency, &metadata)
            .await
            .map_err(|e| ConsultationError::Payment(e.to_string()))?;

        info!(consultation_id = %created.id, price = created.price, "consultation booked");
        Ok((created, checkout))
    }

    /// List consultations visible to the caller: their own side of the
    /// engagement, or everything for admins.
    pub async fn list_for(
        &self,
        caller_id: &Uuid,
        caller_role: Role,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        let list = match caller_role {
            Role::Farmer => self.repo.list_for_farmer(caller_id).await?,
            Role::Agronomist => self.repo.list_for_agronomist(caller_id).await?,
            Role::Admin => self.repo.list_all().await?,
        };
        Ok(list)
    }

    pub async fn get(&self, consultation_id: &Uuid) -> Result<Consultation, ConsultationError> {
        self.repo
            .get(consultation_id)
            .await?
            .ok_or(ConsultationError::NotFound)
    }

    /// Generic status update for the involved parties or an admin.
    ///
    /// `pending -> paid` is rejected here; it only happens through
    /// payment capture.
    pub async fn update_status(
        &self,
        consultation_id: &Uuid,
        caller_id: &Uuid,
        caller_role: Role,
        new_status: ConsultationStatus,
        notes: Option<String>,
    ) -> Result<Consultation, ConsultationError> {
        let mut consultation = self.get(consultation_id).await?;

        if !consultation.is_party(caller_id) && caller_role != Role::Admin {
            return Err(ConsultationError::Forbidden);
        }

        if !consultation.status.can_transition(new_status) {
            return Err(ConsultationError::InvalidTransition {
                from: consultation.status,
                to: new_status,
            });
        }

        let from = consultation.status;
        consultation.status = new_status;
        if let Some(notes) = notes {
            consultation.notes = Some(notes);
        }
        consultation.updated_at = Utc::now();
        self.repo.update(&consultation).await?;

        info!(consultation_id = %consultation_id, %from, to = %new_status, "consultation status updated");
        Ok(consultation)
    }

    /// Simulate a payment capture for local development, standing in for
    /// a real gateway webhook. Caller must be a party or an admin.
    pub async fn capture_mock(
        &self,
        consultation_id: &Uuid,
        caller_id: &Uuid,
        caller_role: Role,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.get(consultation_id).await?;

        if !consultation.is_party(caller_id) && caller_role != Role::Admin {
            return Err(ConsultationError::Forbidden);
        }
        if consultation.status != ConsultationStatus::Pending {
            return Err(ConsultationError::InvalidTransition {
                from: consultation.status,
                to: ConsultationStatus::Paid,
            });
        }

        let captured = self
            .gateway
            .capture_mock(consultation.price, &consultation.currency)
            .await
            .map_err(|e| ConsultationError::Payment(e.to_string()))?;

        self.record_payment(consultation_id, captured).await
    }

    /// Record a captured payment: move `pending -> paid`, credit the
    /// agronomist net of the platform fee, and append a ledger entry.
    pub async fn record_payment(
        &self,
        consultation_id: &Uuid,
        captured: CapturedPayment,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.get(consultation_id).await?;

        let record = PaymentRecord {
            payment_ref: captured.payment_ref,
            provider: captured.provider.clone(),
            paid_at: Utc::now(),
        };

        // The conditional update is the arbiter under concurrent captures:
        // exactly one caller wins, so the payout is credited exactly once.
        let won = self.repo.mark_paid(consultation_id, &record).await?;
        if !won {
            let current = self.get(consultation_id).await?;
            return Err(ConsultationError::InvalidTransition {
                from: current.status,
                to: ConsultationStatus::Paid,
            });
        }

        let fee = platform_fee(consultation.price, self.fee_percent);
        let credit = consultation.price - fee;
        self.identities
            .credit_balance(&consultation.agronomist_id, credit)
            .await?;

        self.transactions
            .record(&Transaction {
                id: Uuid::now_v7(),
                kind: TransactionKind::ConsultationPayment,
                amount: consultation.price,
                currency: consultation.currency.clone(),
                from_id: Some(consultation.farmer_id),
                to_id: Some(consultation.agronomist_id),
                consultation_id: Some(*consultation_id),
                provider: captured.provider,
                provider_payment_ref: Some(record.payment_ref.clone()),
                created_at: Utc::now(),
            })
            .await?;

        info!(
            consultation_id = %consultation_id,
            amount = consultation.price,
            fee,
            credit,
            "payment captured, agronomist credited"
        );

        self.get(consultation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrilink_types::error::{PaymentError, RepositoryError};
    use agrilink_types::identity::{Identity, Profile, Wallet};
    use std::collections::HashMap;
    use std::sync::Mutex;

    // --- In-memory test doubles ---

    #[derive(Default)]
    struct MemConsultationRepo {
        rows: Mutex<HashMap<Uuid, Consultation>>,
    }

    impl ConsultationRepository for MemConsultationRepo {
        async fn create(&self, c: &Consultation) -> Result<Consultation, RepositoryError> {
            self.rows.lock().unwrap().insert(c.id, c.clone());
            Ok(c.clone())
        }

        async fn get(&self, id: &Uuid) -> Result<Option<Consultation>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }

        async fn list_for_farmer(&self, id: &Uuid) -> Result<Vec<Consultation>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.farmer_id == *id)
                .cloned()
                .collect())
        }

        async fn list_for_agronomist(
            &self,
            id: &Uuid,
        ) -> Result<Vec<Consultation>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.agronomist_id == *id)
                .cloned()
                .collect())
        }

        async fn list_all(&self) -> Result<Vec<Consultation>, RepositoryError> {
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }

        async fn update(&self, c: &Consultation) -> Result<(), RepositoryError> {
            match self.rows.lock().unwrap().get_mut(&c.id) {
                Some(row) => {
                    *row = c.clone();
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }

        async fn mark_paid(
            &self,
            id: &Uuid,
            payment: &PaymentRecord,
        ) -> Result<bool, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
            if row.status != ConsultationStatus::Pending {
                return Ok(false);
            }
            row.status = ConsultationStatus::Paid;
            row.payment = Some(payment.clone());
            Ok(true)
        }
    }

    #[derive(Default)]
    struct MemIdentityRepo {
        rows: Mutex<HashMap<Uuid, Identity>>,
    }

    impl MemIdentityRepo {
        fn seed(&self, role: Role) -> Uuid {
            let now = Utc::now();
            let identity = Identity {
                id: Uuid::now_v7(),
                name: "seed".to_string(),
                email: format!("{}@example.com", Uuid::now_v7()),
                role,
                phone: None,
                profile: Profile::default(),
                wallet: Wallet::default(),
                created_at: now,
                updated_at: now,
            };
            let id = identity.id;
            self.rows.lock().unwrap().insert(id, identity);
            id
        }

        fn balance(&self, id: &Uuid) -> i64 {
            self.rows.lock().unwrap().get(id).unwrap().wallet.balance
        }
    }

    impl IdentityRepository for MemIdentityRepo {
        async fn create(
            &self,
            identity: &Identity,
            _hash: &str,
        ) -> Result<Identity, RepositoryError> {
            self.rows
                .lock()
                .unwrap()
                .insert(identity.id, identity.clone());
            Ok(identity.clone())
        }

        async fn get(&self, id: &Uuid) -> Result<Option<Identity>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }

        async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Identity>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
        }

        async fn get_by_email_with_hash(
            &self,
            _email: &str,
        ) -> Result<Option<(Identity, String)>, RepositoryError> {
            Ok(None)
        }

        async fn update(&self, _identity: &Identity) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn search_agronomists(
            &self,
            _query: Option<&str>,
            _location: Option<&str>,
        ) -> Result<Vec<Identity>, RepositoryError> {
            Ok(vec![])
        }

        async fn credit_balance(&self, id: &Uuid, amount: i64) -> Result<i64, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
            row.wallet.balance += amount;
            Ok(row.wallet.balance)
        }

        async fn try_debit_balance(
            &self,
            id: &Uuid,
            amount: i64,
        ) -> Result<Option<i64>, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
            if row.wallet.balance < amount {
                return Ok(None);
            }
            row.wallet.balance -= amount;
            Ok(Some(row.wallet.balance))
        }
    }

    #[derive(Default)]
    struct MemTransactionRepo {
        entries: Mutex<Vec<Transaction>>,
    }

    impl TransactionRepository for MemTransactionRepo {
        async fn record(&self, t: &Transaction) -> Result<(), RepositoryError> {
            self.entries.lock().unwrap().push(t.clone());
            Ok(())
        }

        async fn list_for(&self, id: &Uuid) -> Result<Vec<Transaction>, RepositoryError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.from_id == Some(*id) || t.to_id == Some(*id))
                .cloned()
                .collect())
        }
    }

    struct MockGateway;

    impl PaymentGateway for MockGateway {
        async fn create_checkout_session(
            &self,
            _amount: i64,
            _currency: &str,
            _metadata: &HashMap<String, String>,
        ) -> Result<CheckoutSession, PaymentError> {
            Ok(CheckoutSession {
                id: "cs_test".to_string(),
                url: "mock://checkout/cs_test".to_string(),
            })
        }

        async fn capture_mock(
            &self,
            _amount: i64,
            _currency: &str,
        ) -> Result<CapturedPayment, PaymentError> {
            Ok(CapturedPayment {
                payment_ref: "pay_test".to_string(),
                provider: "mock".to_string(),
            })
        }

        fn settles_immediately(&self) -> bool {
            true
        }
    }

    type Svc = ConsultationService<MemConsultationRepo, MemIdentityRepo, MemTransactionRepo, MockGateway>;

    fn service(fee_percent: u32) -> Svc {
        ConsultationService::new(
            MemConsultationRepo::default(),
            MemIdentityRepo::default(),
            MemTransactionRepo::default(),
            MockGateway,
            fee_percent,
        )
    }

    fn booking(agronomist_id: Uuid, price: i64) -> NewConsultation {
        NewConsultation {
            agronomist_id,
            topic: "wilting maize".to_string(),
            description: None,
            scheduled_at: None,
            price,
        }
    }

    // --- Tests ---

    #[test]
    fn fee_rounds_half_up_on_cents() {
        assert_eq!(platform_fee(2000, 10), 200);
        assert_eq!(platform_fee(1005, 10), 101); // 100.5 rounds up
        assert_eq!(platform_fee(1004, 10), 100); // 100.4 rounds down
        assert_eq!(platform_fee(999, 10), 100); // 99.9 rounds up
        assert_eq!(platform_fee(100, 0), 0);
    }

    #[tokio::test]
    async fn create_validates_inputs() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);
        let other_farmer = svc.identities.seed(Role::Farmer);

        let err = svc
            .create(
                farmer,
                NewConsultation {
                    topic: "  ".to_string(),
                    ..booking(agronomist, 2000)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConsultationError::Validation(_)));

        let err = svc
            .create(farmer, booking(agronomist, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsultationError::Validation(_)));

        // Target must actually be an agronomist.
        let err = svc
            .create(farmer, booking(other_farmer, 2000))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsultationError::Validation(_)));

        let err = svc.create(farmer, booking(farmer, 2000)).await.unwrap_err();
        assert!(matches!(err, ConsultationError::Validation(_)));
    }

    #[tokio::test]
    async fn create_returns_pending_with_checkout() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);

        let (consultation, checkout) = svc.create(farmer, booking(agronomist, 2000)).await.unwrap();
        assert_eq!(consultation.status, ConsultationStatus::Pending);
        assert_eq!(consultation.price, 2000);
        assert!(consultation.payment.is_none());
        assert_eq!(checkout.id, "cs_test");
    }

    #[tokio::test]
    async fn capture_mock_credits_agronomist_net_of_fee() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);

        let (consultation, _) = svc.create(farmer, booking(agronomist, 2000)).await.unwrap();
        let paid = svc
            .capture_mock(&consultation.id, &farmer, Role::Farmer)
            .await
            .unwrap();

        assert_eq!(paid.status, ConsultationStatus::Paid);
        assert!(paid.payment.is_some());
        assert_eq!(svc.identities.balance(&agronomist), 1800);

        let ledger = svc.transactions.list_for(&agronomist).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::ConsultationPayment);
        assert_eq!(ledger[0].amount, 2000);
    }

    #[tokio::test]
    async fn capture_mock_twice_credits_once() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);

        let (consultation, _) = svc.create(farmer, booking(agronomist, 2000)).await.unwrap();
        svc.capture_mock(&consultation.id, &farmer, Role::Farmer)
            .await
            .unwrap();
        let err = svc
            .capture_mock(&consultation.id, &farmer, Role::Farmer)
            .await
            .unwrap_err();

        assert!(matches!(err, ConsultationError::InvalidTransition { .. }));
        assert_eq!(svc.identities.balance(&agronomist), 1800);
    }

    #[tokio::test]
    async fn capture_mock_rejects_strangers() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);
        let stranger = svc.identities.seed(Role::Farmer);

        let (consultation, _) = svc.create(farmer, booking(agronomist, 2000)).await.unwrap();
        let err = svc
            .capture_mock(&consultation.id, &stranger, Role::Farmer)
            .await
            .unwrap_err();
        assert!(matches!(err, ConsultationError::Forbidden));
    }

    #[tokio::test]
    async fn update_status_walks_the_table_only() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);

        let (consultation, _) = svc.create(farmer, booking(agronomist, 2000)).await.unwrap();

        // pending -> paid through the generic path is rejected.
        let err = svc
            .update_status(
                &consultation.id,
                &farmer,
                Role::Farmer,
                ConsultationStatus::Paid,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConsultationError::InvalidTransition { .. }));

        svc.capture_mock(&consultation.id, &farmer, Role::Farmer)
            .await
            .unwrap();

        // paid -> confirmed -> completed is fine, with notes along the way.
        svc.update_status(
            &consultation.id,
            &agronomist,
            Role::Agronomist,
            ConsultationStatus::Confirmed,
            None,
        )
        .await
        .unwrap();
        let done = svc
            .update_status(
                &consultation.id,
                &agronomist,
                Role::Agronomist,
                ConsultationStatus::Completed,
                Some("resolved on site".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(done.status, ConsultationStatus::Completed);
        assert_eq!(done.notes.as_deref(), Some("resolved on site"));

        // completed is terminal.
        let err = svc
            .update_status(
                &consultation.id,
                &agronomist,
                Role::Agronomist,
                ConsultationStatus::Confirmed,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConsultationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn update_status_requires_party_or_admin() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);
        let stranger = svc.identities.seed(Role::Farmer);
        let admin = svc.identities.seed(Role::Admin);

        let (consultation, _) = svc.create(farmer, booking(agronomist, 2000)).await.unwrap();

        let err = svc
            .update_status(
                &consultation.id,
                &stranger,
                Role::Farmer,
                ConsultationStatus::Cancelled,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConsultationError::Forbidden));

        let cancelled = svc
            .update_status(
                &consultation.id,
                &admin,
                Role::Admin,
                ConsultationStatus::Cancelled,
                None,
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, ConsultationStatus::Cancelled);
    }

    #[tokio::test]
    async fn list_for_matches_caller_side() {
        let svc = service(10);
        let farmer = svc.identities.seed(Role::Farmer);
        let agronomist = svc.identities.seed(Role::Agronomist);
        let admin = svc.identities.seed(Role::Admin);

        svc.create(farmer, booking(agronomist, 2000)).await.unwrap();
        svc.create(farmer, booking(agronomist, 3000)).await.unwrap();

        assert_eq!(svc.list_for(&farmer, Role::Farmer).await.unwrap().len(), 2);
        assert_eq!(
            svc.list_for(&agronomist, Role::Agronomist)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(svc.list_for(&admin, Role::Admin).await.unwrap().len(), 2);
        // The agronomist sees nothing on their farmer side.
        assert_eq!(
            svc.list_for(&agronomist, Role::Farmer).await.unwrap().len(),
            0
        );
    }
}
