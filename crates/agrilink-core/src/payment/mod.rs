//! Payment gateway capability trait.
//!
//! The gateway is an external collaborator: the platform only ever asks it
//! to open a checkout session or (for local development) to simulate a
//! capture. Which implementation is wired in is a configuration decision,
//! never an inline branch on whether a secret happens to be set.

use std::collections::HashMap;

use agrilink_types::error::PaymentError;
use serde::{Deserialize, Serialize};

/// A checkout session handed to the client to complete payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// A captured payment as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedPayment {
    pub payment_ref: String,
    pub provider: String,
}

/// External payment collaborator.
///
/// Implementations live in agrilink-infra: `MockPaymentGateway` and
/// `RemotePaymentGateway`, selected by `config.payment.gateway`.
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout session for the given amount in minor units.
    fn create_checkout_session(
        &self,
        amount: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> impl std::future::Future<Output = Result<CheckoutSession, PaymentError>> + Send;

    /// Simulate a successful capture. Only meaningful on the mock gateway;
    /// the remote gateway rejects it.
    fn capture_mock(
        &self,
        amount: i64,
        currency: &str,
    ) -> impl std::future::Future<Output = Result<CapturedPayment, PaymentError>> + Send;

    /// Whether checkout settles synchronously (mock) or via a later
    /// webhook (remote). Subscriptions activate immediately only when true.
    fn settles_immediately(&self) -> bool;
}
