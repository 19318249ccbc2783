//! Consultation types and the status state machine.
//!
//! A consultation is a priced engagement between one farmer and one
//! agronomist. Its status walks a fixed transition table; `paid` is the
//! gate for payout and is reachable only through payment capture, never
//! through the generic status-update path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a consultation.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('pending', 'paid', 'confirmed', 'completed', 'cancelled'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Pending,
    Paid,
    Confirmed,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    /// Whether the generic status-update path may move `self` to `to`.
    ///
    /// `Pending -> Paid` is deliberately absent: that transition happens
    /// only through payment capture.
    pub fn can_transition(self, to: ConsultationStatus) -> bool {
        use ConsultationStatus::*;
        matches!(
            (self, to),
            (Pending, Cancelled)
                | (Paid, Confirmed)
                | (Paid, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConsultationStatus::Completed | ConsultationStatus::Cancelled
        )
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationStatus::Pending => write!(f, "pending"),
            ConsultationStatus::Paid => write!(f, "paid"),
            ConsultationStatus::Confirmed => write!(f, "confirmed"),
            ConsultationStatus::Completed => write!(f, "completed"),
            ConsultationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ConsultationStatus::Pending),
            "paid" => Ok(ConsultationStatus::Paid),
            "confirmed" => Ok(ConsultationStatus::Confirmed),
            "completed" => Ok(ConsultationStatus::Completed),
            "cancelled" => Ok(ConsultationStatus::Cancelled),
            other => Err(format!("invalid consultation status: '{other}'")),
        }
    }
}

impl Default for ConsultationStatus {
    fn default() -> Self {
        ConsultationStatus::Pending
    }
}

/// External payment reference stored once a consultation is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_ref: String,
    pub provider: String,
    pub paid_at: DateTime<Utc>,
}

/// A priced engagement between one farmer and one agronomist.
///
/// Price is immutable after creation. Invariants: `farmer_id !=
/// agronomist_id`, `price > 0`, non-empty topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub agronomist_id: Uuid,
    pub topic: String,
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Integer minor units (cents).
    pub price: i64,
    pub currency: String,
    pub status: ConsultationStatus,
    pub payment: Option<PaymentRecord>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    /// Whether `identity_id` is the farmer or the agronomist on this record.
    pub fn is_party(&self, identity_id: &Uuid) -> bool {
        self.farmer_id == *identity_id || self.agronomist_id == *identity_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConsultationStatus::*;

    const ALL: [ConsultationStatus; 5] = [Pending, Paid, Confirmed, Completed, Cancelled];

    #[test]
    fn test_allowed_transitions() {
        assert!(Pending.can_transition(Cancelled));
        assert!(Paid.can_transition(Confirmed));
        assert!(Paid.can_transition(Cancelled));
        assert!(Confirmed.can_transition(Completed));
        assert!(Confirmed.can_transition(Cancelled));
    }

    #[test]
    fn test_pending_to_paid_not_in_generic_table() {
        // Reachable only through payment capture.
        assert!(!Pending.can_transition(Paid));
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        for to in ALL {
            assert!(!Completed.can_transition(to), "completed -> {to}");
            assert!(!Cancelled.can_transition(to), "cancelled -> {to}");
        }
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Paid.is_terminal());
    }

    #[test]
    fn test_every_other_pair_rejected() {
        let allowed = [
            (Pending, Cancelled),
            (Paid, Confirmed),
            (Paid, Cancelled),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                let expected = allowed.contains(&(from, to));
                assert_eq!(from.can_transition(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_status_roundtrip() {
        for status in ALL {
            let parsed: ConsultationStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
    }

    #[test]
    fn test_is_party() {
        let farmer = Uuid::now_v7();
        let agronomist = Uuid::now_v7();
        let consultation = Consultation {
            id: Uuid::now_v7(),
            farmer_id: farmer,
            agronomist_id: agronomist,
            topic: "soil acidity".to_string(),
            description: None,
            scheduled_at: None,
            price: 2000,
            currency: "usd".to_string(),
            status: Pending,
            payment: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(consultation.is_party(&farmer));
        assert!(consultation.is_party(&agronomist));
        assert!(!consultation.is_party(&Uuid::now_v7()));
    }
}
