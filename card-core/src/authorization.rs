//! Durable authorization record and its status machine

use crate::error::{Error, Result};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authorization lifecycle.
///
/// ```text
/// (new) -> APPROVED -> CLEARED -> REVERSED
///       -> APPROVED -> RELEASED
///       -> DECLINED
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Approved,
    Declined,
    Cleared,
    Released,
    Reversed,
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthorizationStatus::Approved => "APPROVED",
            AuthorizationStatus::Declined => "DECLINED",
            AuthorizationStatus::Cleared => "CLEARED",
            AuthorizationStatus::Released => "RELEASED",
            AuthorizationStatus::Reversed => "REVERSED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AuthorizationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "APPROVED" => Ok(AuthorizationStatus::Approved),
            "DECLINED" => Ok(AuthorizationStatus::Declined),
            "CLEARED" => Ok(AuthorizationStatus::Cleared),
            "RELEASED" => Ok(AuthorizationStatus::Released),
            "REVERSED" => Ok(AuthorizationStatus::Reversed),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

/// Merchant metadata carried on authorization requests and records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Merchant {
    pub name: String,
    pub category_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Internal authorization request, already translated from whatever the
/// processor sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub authorization_id: String,
    pub card_id: String,
    pub amount: Money,
    pub merchant: Merchant,
    pub idempotency_key: String,
}

/// Decision returned to the caller. Reconstructable from the stored record
/// so duplicate requests always observe the original decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub authorization_id: String,
    pub status: AuthorizationStatus,
    pub decline_reason: Option<String>,
}

impl AuthorizationResponse {
    pub fn approved(authorization_id: impl Into<String>) -> Self {
        Self {
            authorization_id: authorization_id.into(),
            status: AuthorizationStatus::Approved,
            decline_reason: None,
        }
    }

    pub fn declined(authorization_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            authorization_id: authorization_id.into(),
            status: AuthorizationStatus::Declined,
            decline_reason: Some(reason.into()),
        }
    }
}

/// Persisted authorization record. Tracks the lifecycle from initial
/// decision through clearing, release or reversal. The CBS owns the money;
/// this record owns the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    pub authorization_id: String,
    pub card_id: String,
    /// CBS account reference resolved through the card mapping. "UNKNOWN"
    /// for declines recorded before the mapping could be resolved.
    pub account_ref: String,
    pub amount: Money,
    pub cleared_amount: Option<Money>,
    pub status: AuthorizationStatus,
    pub merchant: Merchant,
    pub decline_reason: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Authorization {
    pub fn approved(request: &AuthorizationRequest, account_ref: impl Into<String>) -> Self {
        Self::record(request, account_ref, AuthorizationStatus::Approved, None)
    }

    pub fn declined(
        request: &AuthorizationRequest,
        account_ref: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::record(
            request,
            account_ref,
            AuthorizationStatus::Declined,
            Some(reason.into()),
        )
    }

    fn record(
        request: &AuthorizationRequest,
        account_ref: impl Into<String>,
        status: AuthorizationStatus,
        decline_reason: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            authorization_id: request.authorization_id.clone(),
            card_id: request.card_id.clone(),
            account_ref: account_ref.into(),
            amount: request.amount,
            cleared_amount: None,
            status,
            merchant: request.merchant.clone(),
            decline_reason,
            idempotency_key: request.idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Finalize the debit. Requires Approved; partial clears are allowed up
    /// to the authorized amount.
    pub fn clear(&mut self, clearing_amount: Money) -> Result<()> {
        if self.status != AuthorizationStatus::Approved {
            return Err(Error::InvalidTransition {
                status: self.status,
                operation: "clear",
            });
        }
        if clearing_amount.is_greater_than(&self.amount)? {
            return Err(Error::AmountExceeded(
                "Clearing amount cannot exceed authorization amount".to_string(),
            ));
        }
        self.status = AuthorizationStatus::Cleared;
        self.cleared_amount = Some(clearing_amount);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Cancel the hold without debiting. Requires Approved.
    pub fn release(&mut self) -> Result<()> {
        if self.status != AuthorizationStatus::Approved {
            return Err(Error::InvalidTransition {
                status: self.status,
                operation: "release",
            });
        }
        self.status = AuthorizationStatus::Released;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Refund a cleared transaction. The terminal status is Reversed
    /// whether the reversal was partial or full; ledger entries carry the
    /// amounts.
    pub fn reverse(&mut self, reversal_amount: Money) -> Result<()> {
        if self.status != AuthorizationStatus::Cleared {
            return Err(Error::InvalidTransition {
                status: self.status,
                operation: "reverse",
            });
        }
        let cleared = self.cleared_amount.as_ref().ok_or(Error::InvalidTransition {
            status: self.status,
            operation: "reverse",
        })?;
        if reversal_amount.is_greater_than(cleared)? {
            return Err(Error::AmountExceeded(
                "Reversal amount cannot exceed cleared amount".to_string(),
            ));
        }
        self.status = AuthorizationStatus::Reversed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Rebuild the caller-visible response from the stored decision.
    pub fn to_response(&self) -> AuthorizationResponse {
        AuthorizationResponse {
            authorization_id: self.authorization_id.clone(),
            status: self.status,
            decline_reason: self.decline_reason.clone(),
        }
    }
}
