//! Business logic for AgriLink.
//!
//! Services are generic over repository traits (native async fn in traits,
//! RPITIT); concrete implementations live in `agrilink-infra`. This crate
//! also owns the in-process presence registry and the payment-gateway
//! capability trait.

pub mod chat;
pub mod consultation;
pub mod identity;
pub mod payment;
pub mod presence;
pub mod subscription;
pub mod transaction;
