//! Identity service: registration, credential checks, profiles, payouts.

use agrilink_types::error::{IdentityError, RepositoryError};
use agrilink_types::identity::{Identity, Profile, Role, Wallet};
use agrilink_types::transaction::{Transaction, TransactionKind};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::identity::hasher::PasswordHasher;
use crate::identity::repository::IdentityRepository;
use crate::transaction::TransactionRepository;

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

/// Input for account registration.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
}

/// Profile edits; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// Orchestrates account lifecycle and wallet movements.
///
/// Generic over the repository and hasher traits so agrilink-core never
/// depends on agrilink-infra.
pub struct IdentityService<R, T, H>
where
    R: IdentityRepository,
    T: TransactionRepository,
    H: PasswordHasher,
{
    repo: R,
    transactions: T,
    hasher: H,
}

impl<R, T, H> IdentityService<R, T, H>
where
    R: IdentityRepository,
    T: TransactionRepository,
    H: PasswordHasher,
{
    pub fn new(repo: R, transactions: T, hasher: H) -> Self {
        Self {
            repo,
            transactions,
            hasher,
        }
    }

    /// Register a new farmer or agronomist account.
    ///
    /// Admin accounts are seeded operationally and cannot be registered
    /// through this path.
    pub async fn register(&self, input: NewIdentity) -> Result<Identity, IdentityError> {
        if input.name.trim().is_empty() {
            return Err(IdentityError::Validation("name must not be empty".into()));
        }
        if !input.email.contains('@') {
            return Err(IdentityError::Validation(format!(
                "'{}' is not a valid email",
                input.email
            )));
        }
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if input.role == Role::Admin {
            return Err(IdentityError::Forbidden);
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let now = Utc::now();
        let identity = Identity {
            id: Uuid::now_v7(),
            name: input.name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            role: input.role,
            phone: input.phone,
            profile: Profile::default(),
            wallet: Wallet::default(),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&identity, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => IdentityError::EmailTaken(identity.email.clone()),
                other => IdentityError::Repository(other),
            })?;

        info!(identity_id = %created.id, role = %created.role, "identity registered");
        Ok(created)
    }

    /// Check email + password. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        let found = self
            .repo
            .get_by_email_with_hash(&email.trim().to_lowercase())
            .await?;

        let Some((identity, hash)) = found else {
            return Err(IdentityError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &hash)? {
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(identity)
    }

    pub async fn get(&self, identity_id: &Uuid) -> Result<Identity, IdentityError> {
        self.repo
            .get(identity_id)
            .await?
            .ok_or(IdentityError::NotFound)
    }

    /// Apply profile edits and return the updated identity.
    pub async fn update_profile(
        &self,
        identity_id: &Uuid,
        update: ProfileUpdate,
    ) -> Result<Identity, IdentityError> {
        let mut identity = self.get(identity_id).await?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(IdentityError::Validation("name must not be empty".into()));
            }
            identity.name = name.trim().to_string();
        }
        if let Some(phone) = update.phone {
            identity.phone = Some(phone);
        }
        if let Some(bio) = update.bio {
            identity.profile.bio = Some(bio);
        }
        if let Some(location) = update.location {
            identity.profile.location = Some(location);
        }
        if let Some(skills) = update.skills {
            identity.profile.skills = skills;
        }
        identity.updated_at = Utc::now();

        self.repo.update(&identity).await?;
        Ok(identity)
    }

    /// Directory search over agronomist accounts.
    pub async fn search_agronomists(
        &self,
        query: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<Identity>, IdentityError> {
        Ok(self.repo.search_agronomists(query, location).await?)
    }

    /// Agronomist payout: debit the wallet and record a `payout` ledger
    /// entry. Returns the new balance.
    pub async fn withdraw(&self, identity_id: &Uuid, amount: i64) -> Result<i64, IdentityError> {
        let identity = self.get(identity_id).await?;
        if identity.role != Role::Agronomist {
            return Err(IdentityError::Forbidden);
        }
        if amount <= 0 {
            return Err(IdentityError::Validation(
                "withdraw amount must be positive".into(),
            ));
        }

        let Some(new_balance) = self.repo.try_debit_balance(identity_id, amount).await? else {
            return Err(IdentityError::Validation("insufficient balance".into()));
        };

        self.transactions
            .record(&Transaction {
                id: Uuid::now_v7(),
                kind: TransactionKind::Payout,
                amount,
                currency: identity.wallet.currency.clone(),
                from_id: Some(*identity_id),
                to_id: None,
                consultation_id: None,
                provider: "mock".to_string(),
                provider_payment_ref: None,
                created_at: Utc::now(),
            })
            .await?;

        info!(identity_id = %identity_id, amount, new_balance, "payout recorded");
        Ok(new_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrilink_types::transaction::Transaction;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // --- In-memory test doubles ---

    #[derive(Default)]
    struct MemIdentityRepo {
        by_id: Mutex<HashMap<Uuid, (Identity, String)>>,
    }

    impl IdentityRepository for MemIdentityRepo {
        async fn create(
            &self,
            identity: &Identity,
            password_hash: &str,
        ) -> Result<Identity, RepositoryError> {
            let mut map = self.by_id.lock().unwrap();
            if map.values().any(|(i, _)| i.email == identity.email) {
                return Err(RepositoryError::Conflict("email taken".into()));
            }
            map.insert(identity.id, (identity.clone(), password_hash.to_string()));
            Ok(identity.clone())
        }

        async fn get(&self, identity_id: &Uuid) -> Result<Option<Identity>, RepositoryError> {
            Ok(self
                .by_id
                .lock()
                .unwrap()
                .get(identity_id)
                .map(|(i, _)| i.clone()))
        }

        async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Identity>, RepositoryError> {
            let map = self.by_id.lock().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| map.get(id).map(|(i, _)| i.clone()))
                .collect())
        }

        async fn get_by_email_with_hash(
            &self,
            email: &str,
        ) -> Result<Option<(Identity, String)>, RepositoryError> {
            Ok(self
                .by_id
                .lock()
                .unwrap()
                .values()
                .find(|(i, _)| i.email == email)
                .cloned())
        }

        async fn update(&self, identity: &Identity) -> Result<(), RepositoryError> {
            let mut map = self.by_id.lock().unwrap();
            match map.get_mut(&identity.id) {
                Some(entry) => {
                    entry.0 = identity.clone();
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }

        async fn search_agronomists(
            &self,
            query: Option<&str>,
            _location: Option<&str>,
        ) -> Result<Vec<Identity>, RepositoryError> {
            let q = query.unwrap_or("").to_lowercase();
            Ok(self
                .by_id
                .lock()
                .unwrap()
                .values()
                .filter(|(i, _)| i.role == Role::Agronomist)
                .filter(|(i, _)| i.name.to_lowercase().contains(&q))
                .map(|(i, _)| i.clone())
                .collect())
        }

        async fn credit_balance(
            &self,
            identity_id: &Uuid,
            amount: i64,
        ) -> Result<i64, RepositoryError> {
            let mut map = self.by_id.lock().unwrap();
            let entry = map.get_mut(identity_id).ok_or(RepositoryError::NotFound)?;
            entry.0.wallet.balance += amount;
            Ok(entry.0.wallet.balance)
        }

        async fn try_debit_balance(
            &self,
            identity_id: &Uuid,
            amount: i64,
        ) -> Result<Option<i64>, RepositoryError> {
            let mut map = self.by_id.lock().unwrap();
            let entry = map.get_mut(identity_id).ok_or(RepositoryError::NotFound)?;
            if entry.0.wallet.balance < amount {
                return Ok(None);
            }
            entry.0.wallet.balance -= amount;
            Ok(Some(entry.0.wallet.balance))
        }
    }

    #[derive(Default)]
    struct MemTransactionRepo {
        entries: Mutex<Vec<Transaction>>,
    }

    impl TransactionRepository for MemTransactionRepo {
        async fn record(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
            self.entries.lock().unwrap().push(transaction.clone());
            Ok(())
        }

        async fn list_for(&self, identity_id: &Uuid) -> Result<Vec<Transaction>, RepositoryError> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.from_id == Some(*identity_id) || t.to_id == Some(*identity_id))
                .cloned()
                .collect())
        }
    }

    /// Reversible "hash" good enough for service-level tests.
    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String, IdentityError> {
            Ok(format!("hashed:{password}"))
        }

        fn verify(&self, password: &str, hash: &str) -> Result<bool, IdentityError> {
            Ok(hash == format!("hashed:{password}"))
        }
    }

    fn service() -> IdentityService<MemIdentityRepo, MemTransactionRepo, PlainHasher> {
        IdentityService::new(
            MemIdentityRepo::default(),
            MemTransactionRepo::default(),
            PlainHasher,
        )
    }

    fn farmer_input() -> NewIdentity {
        NewIdentity {
            name: "Kofi Mensah".to_string(),
            email: "Kofi@Example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            role: Role::Farmer,
            phone: None,
        }
    }

    // --- Tests ---

    #[tokio::test]
    async fn register_normalizes_email_and_login_roundtrips() {
        let svc = service();
        let created = svc.register(farmer_input()).await.unwrap();
        assert_eq!(created.email, "kofi@example.com");

        let verified = svc
            .verify_credentials("kofi@example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(verified.id, created.id);
    }

    #[tokio::test]
    async fn register_duplicate_email_is_conflict() {
        let svc = service();
        svc.register(farmer_input()).await.unwrap();
        let err = svc.register(farmer_input()).await.unwrap_err();
        assert!(matches!(err, IdentityError::EmailTaken(_)));
    }

    #[tokio::test]
    async fn register_rejects_short_password_and_admin_role() {
        let svc = service();
        let err = svc
            .register(NewIdentity {
                password: "short".to_string(),
                ..farmer_input()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));

        let err = svc
            .register(NewIdentity {
                role: Role::Admin,
                ..farmer_input()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Forbidden));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_identical() {
        let svc = service();
        svc.register(farmer_input()).await.unwrap();

        let wrong_pw = svc
            .verify_credentials("kofi@example.com", "nope-nope-nope")
            .await
            .unwrap_err();
        let unknown = svc
            .verify_credentials("nobody@example.com", "hunter2hunter2")
            .await
            .unwrap_err();
        assert!(matches!(wrong_pw, IdentityError::InvalidCredentials));
        assert!(matches!(unknown, IdentityError::InvalidCredentials));
    }

    #[tokio::test]
    async fn update_profile_merges_fields() {
        let svc = service();
        let created = svc.register(farmer_input()).await.unwrap();

        let updated = svc
            .update_profile(
                &created.id,
                ProfileUpdate {
                    bio: Some("maize and cassava".to_string()),
                    skills: Some(vec!["irrigation".to_string()]),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Kofi Mensah");
        assert_eq!(updated.profile.bio.as_deref(), Some("maize and cassava"));
        assert_eq!(updated.profile.skills, vec!["irrigation"]);
    }

    #[tokio::test]
    async fn withdraw_requires_agronomist_and_funds() {
        let svc = service();
        let farmer = svc.register(farmer_input()).await.unwrap();
        let agronomist = svc
            .register(NewIdentity {
                name: "Amara Diallo".to_string(),
                email: "amara@example.com".to_string(),
                role: Role::Agronomist,
                ..farmer_input()
            })
            .await
            .unwrap();

        // Farmers cannot withdraw.
        let err = svc.withdraw(&farmer.id, 100).await.unwrap_err();
        assert!(matches!(err, IdentityError::Forbidden));

        // No funds yet.
        let err = svc.withdraw(&agronomist.id, 100).await.unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));

        svc.repo.credit_balance(&agronomist.id, 500).await.unwrap();
        let balance = svc.withdraw(&agronomist.id, 300).await.unwrap();
        assert_eq!(balance, 200);

        // A payout ledger entry was written.
        let ledger = svc.transactions.list_for(&agronomist.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].kind, TransactionKind::Payout);
        assert_eq!(ledger[0].amount, 300);
    }

    #[tokio::test]
    async fn withdraw_rejects_non_positive_amount() {
        let svc = service();
        let agronomist = svc
            .register(NewIdentity {
                email: "amara@example.com".to_string(),
                role: Role::Agronomist,
                ..farmer_input()
            })
            .await
            .unwrap();

        let err = svc.withdraw(&agronomist.id, 0).await.unwrap_err();
        assert!(matches!(err, IdentityError::Validation(_)));
    }
}
