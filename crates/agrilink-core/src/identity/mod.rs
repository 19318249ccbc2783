//! Identity domain: accounts, credentials, profiles, wallets.

pub mod hasher;
pub mod repository;
pub mod service;
