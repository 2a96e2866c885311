//! Hold records for the shadow-journal workaround
//!
//! Fineract has no native card-style holds, so the adapter tracks its own
//! hold state keyed by the authorization reference. The record carries the
//! journal entry id so a reconciliation job can find the shadow posting.

use async_trait::async_trait;
use card_core::money::Currency;
use card_core::store::StoreResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HoldStatus {
    Active,
    Committed,
    Released,
}

impl fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HoldStatus::Active => "ACTIVE",
            HoldStatus::Committed => "COMMITTED",
            HoldStatus::Released => "RELEASED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for HoldStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(HoldStatus::Active),
            "COMMITTED" => Ok(HoldStatus::Committed),
            "RELEASED" => Ok(HoldStatus::Released),
            other => Err(format!("Unknown hold status: {}", other)),
        }
    }
}

/// One hold per authorization. Transitions monotonically
/// ACTIVE -> {COMMITTED, RELEASED}.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldRecord {
    pub authorization_id: String,
    /// Fineract savings account id, stringified.
    pub account_ref: String,
    /// Fineract transaction id of the shadow journal posting.
    pub journal_entry_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HoldRecord {
    pub fn active(
        authorization_id: impl Into<String>,
        account_ref: impl Into<String>,
        journal_entry_id: impl Into<String>,
        amount: Decimal,
        currency: Currency,
    ) -> Self {
        let now = Utc::now();
        Self {
            authorization_id: authorization_id.into(),
            account_ref: account_ref.into(),
            journal_entry_id: journal_entry_id.into(),
            amount,
            currency,
            status: HoldStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_committed(&mut self) {
        self.status = HoldStatus::Committed;
        self.updated_at = Utc::now();
    }

    pub fn mark_released(&mut self) {
        self.status = HoldStatus::Released;
        self.updated_at = Utc::now();
    }
}

/// Adapter-owned hold persistence. The durable implementation lives with
/// the service's relational stores; this crate ships an in-memory one.
#[async_trait]
pub trait HoldStore: Send + Sync {
    async fn find(&self, authorization_id: &str) -> StoreResult<Option<HoldRecord>>;

    async fn insert(&self, hold: &HoldRecord) -> StoreResult<()>;

    async fn update(&self, hold: &HoldRecord) -> StoreResult<()>;
}

#[derive(Default)]
pub struct MemoryHoldStore {
    holds: RwLock<HashMap<String, HoldRecord>>,
}

impl MemoryHoldStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HoldStore for MemoryHoldStore {
    async fn find(&self, authorization_id: &str) -> StoreResult<Option<HoldRecord>> {
        Ok(self.holds.read().await.get(authorization_id).cloned())
    }

    async fn insert(&self, hold: &HoldRecord) -> StoreResult<()> {
        use card_core::store::StoreError;

        let mut holds = self.holds.write().await;
        if holds.contains_key(&hold.authorization_id) {
            return Err(StoreError::Duplicate(hold.authorization_id.clone()));
        }
        holds.insert(hold.authorization_id.clone(), hold.clone());
        Ok(())
    }

    async fn update(&self, hold: &HoldRecord) -> StoreResult<()> {
        self.holds
            .write()
            .await
            .insert(hold.authorization_id.clone(), hold.clone());
        Ok(())
    }
}
