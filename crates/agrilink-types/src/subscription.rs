//! Subscription types.
//!
//! Farmers subscribe to a named plan for a fixed duration. Settlement goes
//! through the configured payment gateway; the mock gateway activates the
//! subscription immediately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A farmer's plan subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub farmer_id: Uuid,
    /// Plan identifier, e.g. `monthly-basic`.
    pub plan_id: String,
    /// Integer minor units (cents).
    pub price: i64,
    pub currency: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub provider: String,
    pub active: bool,
}

impl Subscription {
    /// Whether the subscription covers `at`.
    pub fn is_current(&self, at: DateTime<Utc>) -> bool {
        self.active && self.started_at <= at && at < self.expires_at
    }
}
