//! Mock payment gateway for local development.
//!
//! Fabricates checkout sessions and captures with synthetic ids so the
//! whole payment flow can run with no external provider.

use std::collections::HashMap;

use agrilink_core::payment::{CapturedPayment, CheckoutSession, PaymentGateway};
use agrilink_types::error::PaymentError;
use tracing::debug;
use uuid::Uuid;

/// Gateway that settles everything synchronously with fake references.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockPaymentGateway;

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self
    }
}

impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(
        &self,
        amount: i64,
        currency: &str,
        _metadata: &HashMap<String, String>,
    ) -> Result<CheckoutSession, PaymentError> {
        let id = format!("mock_session_{}", Uuid::now_v7().simple());
        debug!(session_id = %id, amount, currency, "mock checkout session created");
        Ok(CheckoutSession {
            url: format!("mock://checkout/{id}"),
            id,
        })
    }

    async fn capture_mock(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<CapturedPayment, PaymentError> {
        let payment_ref = format!("mock_payment_{}", Uuid::now_v7().simple());
        debug!(payment_ref = %payment_ref, amount, currency, "mock payment captured");
        Ok(CapturedPayment {
            payment_ref,
            provider: "mock".to_string(),
        })
    }

    fn settles_immediately(&self) -> bool {
        true
    }
}
