//! Identity types: accounts, roles, profiles, and wallets.
//!
//! An identity is a registered farmer, agronomist, or admin. The wallet
//! holds the balance credited to agronomists on payment settlement, in
//! integer minor units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Account role.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (role IN ('farmer', 'agronomist', 'admin'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Agronomist,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Farmer => write!(f, "farmer"),
            Role::Agronomist => write!(f, "agronomist"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "farmer" => Ok(Role::Farmer),
            "agronomist" => Ok(Role::Agronomist),
            "admin" => Ok(Role::Admin),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// Public profile attached to an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub bio: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Monetary balance in integer minor units plus currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: i64,
    pub currency: String,
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            balance: 0,
            currency: "usd".to_string(),
        }
    }
}

/// A registered account.
///
/// The password hash never leaves the repository layer; this type is safe
/// to serialize into API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub profile: Profile,
    pub wallet: Wallet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display info for a chat participant: the subset of an identity that
/// the other party is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl From<&Identity> for ParticipantInfo {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            role: identity.role,
        }
    }
}
