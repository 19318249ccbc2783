//! Shared domain types for AgriLink.
//!
//! This crate contains the core domain types used across the AgriLink
//! marketplace: Identity, Consultation, ChatThread, Subscription, and their
//! associated error types and realtime wire contracts.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod consultation;
pub mod error;
pub mod event;
pub mod identity;
pub mod subscription;
pub mod transaction;
