//! Payment gateway implementations, selected by configuration.

pub mod mock;
pub mod remote;

pub use mock::MockPaymentGateway;
pub use remote::RemotePaymentGateway;

use std::collections::HashMap;

use agrilink_core::payment::{CapturedPayment, CheckoutSession, PaymentGateway};
use agrilink_types::config::{GatewayKind, PaymentConfig};
use agrilink_types::error::PaymentError;

/// The configured gateway, resolved once at startup from
/// `config.payment.gateway`.
#[derive(Debug, Clone)]
pub enum ConfiguredGateway {
    Mock(MockPaymentGateway),
    Remote(RemotePaymentGateway),
}

impl ConfiguredGateway {
    /// Build the gateway the config asks for.
    ///
    /// A remote gateway without an endpoint is a configuration error.
    pub fn from_config(config: &PaymentConfig) -> Result<Self, PaymentError> {
        match config.gateway {
            GatewayKind::Mock => Ok(ConfiguredGateway::Mock(MockPaymentGateway::new())),
            GatewayKind::Remote => {
                let endpoint = config.remote_endpoint.clone().ok_or_else(|| {
                    PaymentError::Gateway(
                        "payment.remote_endpoint is required for the remote gateway".to_string(),
                    )
                })?;
                Ok(ConfiguredGateway::Remote(RemotePaymentGateway::new(
                    endpoint,
                )))
            }
        }
    }
}

impl PaymentGateway for ConfiguredGateway {
    async fn create_checkout_session(
        &self,
        amount: i64,
        currency: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<CheckoutSession, PaymentError> {
        match self {
            ConfiguredGateway::Mock(gateway) => {
                gateway.create_checkout_session(amount, currency, metadata).await
            }
            ConfiguredGateway::Remote(gateway) => {
                gateway.create_checkout_session(amount, currency, metadata).await
            }
        }
    }

    async fn capture_mock(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<CapturedPayment, PaymentError> {
        match self {
            ConfiguredGateway::Mock(gateway) => gateway.capture_mock(amount, currency).await,
            ConfiguredGateway::Remote(gateway) => gateway.capture_mock(amount, currency).await,
        }
    }

    fn settles_immediately(&self) -> bool {
        match self {
            ConfiguredGateway::Mock(gateway) => gateway.settles_immediately(),
            ConfiguredGateway::Remote(gateway) => gateway.settles_immediately(),
        }
    }
}
