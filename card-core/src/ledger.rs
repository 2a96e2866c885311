//! Append-only audit ledger entries
//!
//! The ledger records coordination events, not balances. The CBS is the
//! source of truth for money; these rows exist for audit and for the
//! settlement pipeline's idempotency checks.

use crate::error::{Error, Result};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntryType {
    Debit,
    Credit,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Debit => write!(f, "DEBIT"),
            EntryType::Credit => write!(f, "CREDIT"),
        }
    }
}

impl FromStr for EntryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "DEBIT" => Ok(EntryType::Debit),
            "CREDIT" => Ok(EntryType::Credit),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// Kind of coordination event the entry records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionType {
    AuthHold,
    AuthRelease,
    ClearingCommit,
    Reversal,
    Deposit,
    Withdrawal,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::AuthHold => "AUTH_HOLD",
            TransactionType::AuthRelease => "AUTH_RELEASE",
            TransactionType::ClearingCommit => "CLEARING_COMMIT",
            TransactionType::Reversal => "REVERSAL",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "AUTH_HOLD" => Ok(TransactionType::AuthHold),
            "AUTH_RELEASE" => Ok(TransactionType::AuthRelease),
            "CLEARING_COMMIT" => Ok(TransactionType::ClearingCommit),
            "REVERSAL" => Ok(TransactionType::Reversal),
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// Immutable once written. The unique idempotency key doubles as the
/// settlement pipeline's decision cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: String,
    pub account_ref: String,
    pub entry_type: EntryType,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub authorization_id: Option<String>,
    pub card_id: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        account_ref: impl Into<String>,
        entry_type: EntryType,
        amount: Money,
        transaction_type: TransactionType,
        authorization_id: Option<String>,
        card_id: Option<String>,
        description: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4().to_string(),
            account_ref: account_ref.into(),
            entry_type,
            amount,
            transaction_type,
            authorization_id,
            card_id,
            description: Some(description.into()),
            idempotency_key: idempotency_key.into(),
            created_at: Utc::now(),
        }
    }

    /// DEBIT entry recording a placed authorization hold.
    pub fn auth_hold(
        account_ref: &str,
        card_id: &str,
        amount: Money,
        authorization_id: &str,
        idempotency_key: &str,
    ) -> Self {
        Self::new(
            account_ref,
            EntryType::Debit,
            amount,
            TransactionType::AuthHold,
            Some(authorization_id.to_string()),
            Some(card_id.to_string()),
            "Authorization hold",
            idempotency_key,
        )
    }

    /// CREDIT entry recording a released hold.
    pub fn auth_release(
        account_ref: &str,
        card_id: &str,
        amount: Money,
        authorization_id: &str,
        idempotency_key: &str,
    ) -> Self {
        Self::new(
            account_ref,
            EntryType::Credit,
            amount,
            TransactionType::AuthRelease,
            Some(authorization_id.to_string()),
            Some(card_id.to_string()),
            "Authorization release",
            idempotency_key,
        )
    }

    /// DEBIT entry recording a committed clearing.
    pub fn clearing(
        account_ref: &str,
        card_id: &str,
        amount: Money,
        authorization_id: &str,
        idempotency_key: &str,
    ) -> Self {
        Self::new(
            account_ref,
            EntryType::Debit,
            amount,
            TransactionType::ClearingCommit,
            Some(authorization_id.to_string()),
            Some(card_id.to_string()),
            "Clearing settlement",
            idempotency_key,
        )
    }

    /// CREDIT entry recording a reversal refund.
    pub fn reversal(
        account_ref: &str,
        card_id: &str,
        amount: Money,
        authorization_id: &str,
        idempotency_key: &str,
    ) -> Self {
        Self::new(
            account_ref,
            EntryType::Credit,
            amount,
            TransactionType::Reversal,
            Some(authorization_id.to_string()),
            Some(card_id.to_string()),
            "Transaction reversal",
            idempotency_key,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_entry_direction_per_event() {
        let amount = Money::new(dec!(50.00), Currency::USD);

        assert_eq!(LedgerEntry::auth_hold("ACC1", "C1", amount, "a1", "k1").entry_type, EntryType::Debit);
        assert_eq!(LedgerEntry::auth_release("ACC1", "C1", amount, "a1", "k2").entry_type, EntryType::Credit);
        assert_eq!(LedgerEntry::clearing("ACC1", "C1", amount, "a1", "k3").entry_type, EntryType::Debit);
        assert_eq!(LedgerEntry::reversal("ACC1", "C1", amount, "a1", "k4").entry_type, EntryType::Credit);
    }

    #[test]
    fn test_transaction_type_round_trip() {
        for s in ["AUTH_HOLD", "AUTH_RELEASE", "CLEARING_COMMIT", "REVERSAL", "DEPOSIT", "WITHDRAWAL"] {
            let parsed: TransactionType = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }
}
