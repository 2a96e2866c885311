//! Card entity and lifecycle

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Card lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CardState {
    Active,
    Frozen,
    Closed,
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardState::Active => "ACTIVE",
            CardState::Frozen => "FROZEN",
            CardState::Closed => "CLOSED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CardState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(CardState::Active),
            "FROZEN" => Ok(CardState::Frozen),
            "CLOSED" => Ok(CardState::Closed),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// A virtual card. Cards never hold money; they authorize access to a CBS
/// account through the card-to-account mapping. The full PAN is never
/// stored, only the display suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub card_id: String,
    pub cardholder_name: String,
    pub last4: String,
    /// End-of-day semantics in UTC: the card is valid through this date.
    pub expiration_date: NaiveDate,
    pub state: CardState,
    /// External reference to the CBS client that owns the card.
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Create a new card. Issued cards start Frozen and are activated
    /// explicitly.
    pub fn issue(
        cardholder_name: impl Into<String>,
        last4: impl Into<String>,
        expiration_date: NaiveDate,
        owner_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            card_id: Uuid::new_v4().to_string(),
            cardholder_name: cardholder_name.into(),
            last4: last4.into(),
            expiration_date,
            state: CardState::Frozen,
            owner_id: owner_id.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn activate(&mut self) -> Result<()> {
        self.transition(CardState::Active, "activate")
    }

    pub fn freeze(&mut self) -> Result<()> {
        self.transition(CardState::Frozen, "freeze")
    }

    pub fn unfreeze(&mut self) -> Result<()> {
        if self.state != CardState::Frozen {
            return Err(Error::InvalidCardState {
                card_id: self.card_id.clone(),
                state: self.state,
                operation: "unfreeze",
            });
        }
        self.state = CardState::Active;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.transition(CardState::Closed, "close")
    }

    pub fn is_active(&self) -> bool {
        self.state == CardState::Active
    }

    /// Expired strictly after the expiration date (the card works through
    /// the whole expiration day, UTC).
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        today > self.expiration_date
    }

    // Closed is terminal; every other transition is allowed from Active
    // or Frozen.
    fn transition(&mut self, to: CardState, operation: &'static str) -> Result<()> {
        if self.state == CardState::Closed {
            return Err(Error::InvalidCardState {
                card_id: self.card_id.clone(),
                state: self.state,
                operation,
            });
        }
        self.state = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> Card {
        Card::issue("Jane Holder", "4242", NaiveDate::from_ymd_opt(2030, 6, 30).unwrap(), "CLIENT-1")
    }

    #[test]
    fn test_issued_card_starts_frozen() {
        let c = card();
        assert_eq!(c.state, CardState::Frozen);
        assert!(!c.is_active());
    }

    #[test]
    fn test_activate_then_freeze_then_unfreeze() {
        let mut c = card();
        c.activate().unwrap();
        assert!(c.is_active());

        c.freeze().unwrap();
        assert_eq!(c.state, CardState::Frozen);

        c.unfreeze().unwrap();
        assert!(c.is_active());
    }

    #[test]
    fn test_unfreeze_requires_frozen() {
        let mut c = card();
        c.activate().unwrap();
        assert!(c.unfreeze().is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut c = card();
        c.close().unwrap();

        assert!(c.activate().is_err());
        assert!(c.freeze().is_err());
        assert!(c.close().is_err());
        assert_eq!(c.state, CardState::Closed);
    }

    #[test]
    fn test_expiry_is_end_of_day() {
        let c = card();
        let expiry = c.expiration_date;
        assert!(!c.is_expired(expiry));
        assert!(c.is_expired(expiry.succ_opt().unwrap()));
    }
}
