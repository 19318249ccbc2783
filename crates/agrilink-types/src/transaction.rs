//! Append-only transaction ledger types.
//!
//! Every payment capture, subscription settlement, and payout leaves one
//! row here for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// What the money moved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    ConsultationPayment,
    SubscriptionPayment,
    Payout,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::ConsultationPayment => write!(f, "consultation_payment"),
            TransactionKind::SubscriptionPayment => write!(f, "subscription_payment"),
            TransactionKind::Payout => write!(f, "payout"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consultation_payment" => Ok(TransactionKind::ConsultationPayment),
            "subscription_payment" => Ok(TransactionKind::SubscriptionPayment),
            "payout" => Ok(TransactionKind::Payout),
            other => Err(format!("invalid transaction kind: '{other}'")),
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    /// Integer minor units (cents).
    pub amount: i64,
    pub currency: String,
    /// Payer, absent for payouts.
    pub from_id: Option<Uuid>,
    /// Payee, absent when money leaves the platform.
    pub to_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    pub provider: String,
    pub provider_payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}
