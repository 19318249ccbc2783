//! Remote payment gateway over HTTP.
//!
//! Posts checkout requests to a configured provider endpoint. Settlement
//! for remote checkouts arrives asynchronously via the provider's webhook,
//! so `settles_immediately` is false and mock capture is rejected.

use std::collections::HashMap;

use agrilink_core::payment::{CapturedPayment, CheckoutSession, PaymentGateway};
use agrilink_types::error::PaymentError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct CheckoutRequest<'a> {
    amount: i64,
    currency: &'a str,
    metadata: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    id: String,
    url: String,
}

/// Gateway that delegates checkout to an external provider endpoint.
#[derive(Debug, Clone)]
pub struct RemotePaymentGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl RemotePaymentGateway {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

impl PaymentGateway for RemotePaymentGateway {
    async fn create_checkout_session(
        &self,
        amount: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.endpoint))
            .json(&CheckoutRequest {
                amount,
                currency,
                metadata,
            })
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::Gateway(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let body: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        Ok(CheckoutSession {
            id: body.id,
            url: body.url,
        })
    }

    async fn capture_mock(
        &self,
        _amount: i64,
        _currency: &str,
    ) -> Result<CapturedPayment, PaymentError> {
        Err(PaymentError::Gateway(
            "remote gateway does not support mock capture".to_string(),
        ))
    }

    fn settles_immediately(&self) -> bool {
        false
    }
}
