//! Subscription service: farmer plan subscriptions through the payment
//! gateway.

use std::collections::HashMap;

use agrilink_types::error::SubscriptionError;
use agrilink_types::identity::Role;
use agrilink_types::subscription::Subscription;
use agrilink_types::transaction::{Transaction, TransactionKind};
use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::payment::{CheckoutSession, PaymentGateway};
use crate::subscription::repository::SubscriptionRepository;
use crate::transaction::TransactionRepository;

/// Input for subscribing to a plan.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    /// Plan identifier, e.g. `monthly-basic`.
    pub plan_id: String,
    /// Integer minor units (cents).
    pub price: i64,
    pub duration_days: u32,
}

/// Outcome of a subscribe call.
///
/// The mock gateway settles synchronously, so the subscription is already
/// active; a remote gateway only hands back the checkout session and
/// settlement arrives later via webhook.
#[derive(Debug, Clone)]
pub struct SubscribeOutcome {
    pub subscription: Option<Subscription>,
    pub checkout: CheckoutSession,
}

pub struct SubscriptionService<S, T, G>
where
    S: SubscriptionRepository,
    T: TransactionRepository,
    G: PaymentGateway,
{
    repo: S,
    transactions: T,
    gateway: G,
}

impl<S, T, G> SubscriptionService<S, T, G>
where
    S: SubscriptionRepository,
    T: TransactionRepository,
    G: PaymentGateway,
{
    pub fn new(repo: S, transactions: T, gateway: G) -> Self {
        Self {
            repo,
            transactions,
            gateway,
        }
    }

    /// Subscribe a farmer to a plan. Farmers only.
    pub async fn subscribe(
        &self,
        caller_id: &Uuid,
        caller_role: Role,
        input: NewSubscription,
    ) -> Result<SubscribeOutcome, SubscriptionError> {
        if caller_role != Role::Farmer {
            return Err(SubscriptionError::Forbidden);
        }
        if input.plan_id.trim().is_empty() {
            return Err(SubscriptionError::Validation(
                "plan id must not be empty".into(),
            ));
        }
        if input.price <= 0 {
            return Err(SubscriptionError::Validation(
                "price must be positive".into(),
            ));
        }
        if input.duration_days == 0 {
            return Err(SubscriptionError::Validation(
                "duration must be at least one day".into(),
            ));
        }

        let mut metadata = HashMap::new();
        metadata.insert("farmer_id".to_string(), caller_id.to_string());
        metadata.insert("plan_id".to_string(), input.plan_id.clone());

        let checkout = self
            .gateway
            .create_checkout_session(input.price, "usd", &metadata)
            .await
            .map_err(|e| SubscriptionError::Payment(e.to_string()))?;

        if !self.gateway.settles_immediately() {
            // Settlement arrives via webhook; nothing to persist yet.
            return Ok(SubscribeOutcome {
                subscription: None,
                checkout,
            });
        }

        let started_at = Utc::now();
        let subscription = Subscription {
            id: Uuid::now_v7(),
            farmer_id: *caller_id,
            plan_id: input.plan_id,
            price: input.price,
            currency: "usd".to_string(),
            started_at,
            expires_at: started_at + Duration::days(i64::from(input.duration_days)),
            provider: "mock".to_string(),
            active: true,
        };
        let created = self.repo.create(&subscription).await?;

        self.transactions
            .record(&Transaction {
                id: Uuid::now_v7(),
                kind: TransactionKind::SubscriptionPayment,
                amount: created.price,
                currency: created.currency.clone(),
                from_id: Some(*caller_id),
                to_id: None,
                consultation_id: None,
                provider: created.provider.clone(),
                provider_payment_ref: Some(checkout.id.clone()),
                created_at: Utc::now(),
            })
            .await?;

        info!(farmer_id = %caller_id, plan_id = %created.plan_id, "subscription activated");
        Ok(SubscribeOutcome {
            subscription: Some(created),
            checkout,
        })
    }

    pub async fn list_for(&self, farmer_id: &Uuid) -> Result<Vec<Subscription>, SubscriptionError> {
        Ok(self.repo.list_for(farmer_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrilink_types::error::{PaymentError, RepositoryError};
    use crate::payment::CapturedPayment;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemSubscriptionRepo {
        rows: Mutex<Vec<Subscription>>,
    }

    impl SubscriptionRepository for MemSubscriptionRepo {
        async fn create(&self, s: &Subscription) -> Result<Subscription, RepositoryError> {
            self.rows.lock().unwrap().push(s.clone());
            Ok(s.clone())
        }

        async fn list_for(&self, farmer_id: &Uuid) -> Result<Vec<Subscription>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.farmer_id == *farmer_id)
                .cloned()
                .collect())
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

    struct TestGateway {
        immediate: bool,
    }

    impl PaymentGateway for TestGateway {
        async fn create_checkout_session(
            &self,
            _amount: i64,
            _currency: &str,
            _metadata: &std::collections::HashMap<String, String>,
        ) -> Result<CheckoutSession, PaymentError> {
            Ok(CheckoutSession {
                id: "cs_sub".to_string(),
                url: "mock://checkout/cs_sub".to_string(),
            })
        }

        async fn capture_mock(
            &self,
            _amount: i64,
            _currency: &str,
        ) -> Result<CapturedPayment, PaymentError> {
            Ok(CapturedPayment {
                payment_ref: "pay_sub".to_string(),
                provider: "mock".to_string(),
            })
        }

        fn settles_immediately(&self) -> bool {
            self.immediate
        }
    }

    fn service(immediate: bool) -> SubscriptionService<MemSubscriptionRepo, MemTransactionRepo, TestGateway> {
        SubscriptionService::new(
            MemSubscriptionRepo::default(),
            MemTransactionRepo::default(),
            TestGateway { immediate },
        )
    }

    fn plan() -> NewSubscription {
        NewSubscription {
            plan_id: "monthly-basic".to_string(),
            price: 500,
            duration_days: 30,
        }
    }

    #[tokio::test]
    async fn mock_gateway_activates_immediately_with_ledger_entry() {
        let svc = service(true);
        let farmer = Uuid::now_v7();

        let outcome = svc.subscribe(&farmer, Role::Farmer, plan()).await.unwrap();
        let subscription = outcome.subscription.unwrap();
        assert!(subscription.active);
        assert!(subscription.is_current(Utc::now()));
        assert_eq!(subscription.plan_id, "monthly-basic");

        assert_eq!(svc.list_for(&farmer).await.unwrap().len(), 1);
        let ledger = svc.transactions.list_for(&farmer).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::SubscriptionPayment);
    }

    #[tokio::test]
    async fn remote_gateway_defers_settlement() {
        let svc = service(false);
        let farmer = Uuid::now_v7();

        let outcome = svc.subscribe(&farmer, Role::Farmer, plan()).await.unwrap();
        assert!(outcome.subscription.is_none());
        assert_eq!(outcome.checkout.id, "cs_sub");
        assert!(svc.list_for(&farmer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_farmers_subscribe() {
        let svc = service(true);
        let agronomist = Uuid::now_v7();

        let err = svc
            .subscribe(&agronomist, Role::Agronomist, plan())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::Forbidden));
    }

    #[tokio::test]
    async fn validates_plan_fields() {
        let svc = service(true);
        let farmer = Uuid::now_v7();

        for bad in [
            NewSubscription {
                plan_id: " ".to_string(),
                ..plan()
            },
            NewSubscription { price: 0, ..plan() },
            NewSubscription {
                duration_days: 0,
                ..plan()
            },
        ] {
            let err = svc.subscribe(&farmer, Role::Farmer, bad).await.unwrap_err();
            assert!(matches!(err, SubscriptionError::Validation(_)));
        }
    }
}
