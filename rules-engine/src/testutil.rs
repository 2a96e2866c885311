//! Shared fixtures for rule tests

use async_trait::async_trait;
use card_core::authorization::{
    Authorization, AuthorizationRequest, AuthorizationStatus, Merchant,
};
use card_core::money::{Currency, Money};
use card_core::store::{StoreError, StoreResult, StoreTx, TransactionStore};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Canned authorization store. `find_by_card_since` filters the way the
/// real stores do; the unit of work is unsupported because rules never
/// open one.
pub struct StubStore {
    authorizations: Vec<Authorization>,
}

impl StubStore {
    pub fn new(authorizations: Vec<Authorization>) -> Self {
        Self { authorizations }
    }
}

#[async_trait]
impl TransactionStore for StubStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        Err(StoreError::Backend("stub store has no unit of work".to_string()))
    }

    async fn find_authorization(
        &self,
        authorization_id: &str,
    ) -> StoreResult<Option<Authorization>> {
        Ok(self
            .authorizations
            .iter()
            .find(|a| a.authorization_id == authorization_id)
            .cloned())
    }

    async fn find_by_card_since(
        &self,
        card_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Authorization>> {
        Ok(self
            .authorizations
            .iter()
            .filter(|a| a.card_id == card_id && a.created_at >= since)
            .cloned()
            .collect())
    }
}

pub fn request_for(card_id: &str, amount: Decimal, currency: Currency) -> AuthorizationRequest {
    AuthorizationRequest {
        authorization_id: format!("auth-{}", next_id()),
        card_id: card_id.to_string(),
        amount: Money::new(amount, currency),
        merchant: Merchant {
            name: "Test Merchant".to_string(),
            category_code: Some("5814".to_string()),
            city: Some("Lisbon".to_string()),
            country: Some("PT".to_string()),
        },
        idempotency_key: format!("key-{}", next_id()),
    }
}

pub fn request_with_mcc(mcc: Option<&str>) -> AuthorizationRequest {
    let mut request = request_for("c1", Decimal::TEN, Currency::USD);
    request.merchant.category_code = mcc.map(|m| m.to_string());
    request
}

/// Approved authorization for `card_id`, created `age_seconds` ago.
pub fn approved(card_id: &str, amount: Decimal, age_seconds: i64) -> Authorization {
    record(card_id, amount, age_seconds, AuthorizationStatus::Approved, None)
}

/// Declined authorization for `card_id`, created `age_seconds` ago.
pub fn declined(card_id: &str, amount: Decimal, age_seconds: i64) -> Authorization {
    record(
        card_id,
        amount,
        age_seconds,
        AuthorizationStatus::Declined,
        Some("test decline".to_string()),
    )
}

fn record(
    card_id: &str,
    amount: Decimal,
    age_seconds: i64,
    status: AuthorizationStatus,
    decline_reason: Option<String>,
) -> Authorization {
    let created_at = Utc::now() - Duration::seconds(age_seconds);
    Authorization {
        authorization_id: format!("auth-{}", next_id()),
        card_id: card_id.to_string(),
        account_ref: "ACC1".to_string(),
        amount: Money::new(amount, Currency::USD),
        cleared_amount: None,
        status,
        merchant: Merchant {
            name: "Test Merchant".to_string(),
            ..Default::default()
        },
        decline_reason,
        idempotency_key: format!("key-{}", next_id()),
        created_at,
        updated_at: created_at,
    }
}

// Monotonic suffix so fixtures never collide on ids or keys.
fn next_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed).to_string()
}
