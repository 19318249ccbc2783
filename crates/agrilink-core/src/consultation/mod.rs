//! Consultation domain: the booking ledger and its status state machine.

pub mod repository;
pub mod service;
