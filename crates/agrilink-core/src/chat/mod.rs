//! Chat domain: threads bound to consultations, messages, read receipts,
//! and the consultation-to-thread binder.

pub mod binder;
pub mod repository;
pub mod store;
