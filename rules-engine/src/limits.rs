//! Spending limit rules

use crate::engine::{Rule, RuleResult};
use crate::Result;
use async_trait::async_trait;
use card_core::authorization::{AuthorizationRequest, AuthorizationStatus};
use card_core::money::Money;
use card_core::store::TransactionStore;
use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Declines any single authorization above the configured cap, compared in
/// the presented currency.
pub struct TransactionLimitRule {
    limit: Decimal,
}

impl TransactionLimitRule {
    pub fn new(limit: Decimal) -> Self {
        Self { limit }
    }
}

#[async_trait]
impl Rule for TransactionLimitRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult> {
        let limit = Money::new(self.limit, request.amount.currency());

        // Same-currency comparison by construction; a mismatch can only
        // mean the presented currency is outside the supported set.
        match request.amount.is_greater_than(&limit) {
            Ok(true) => Ok(RuleResult::Decline(format!(
                "Transaction amount {} exceeds limit {}",
                request.amount.amount(),
                self.limit
            ))),
            Ok(false) => Ok(RuleResult::Approve),
            Err(_) => Ok(RuleResult::Decline("Currency not supported".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "TransactionLimit"
    }
}

/// Caps total approved spend per card per UTC day. Sums approved
/// authorizations created since UTC midnight, adds the request amount and
/// declines when the total goes over the cap.
pub struct DailySpendLimitRule {
    store: Arc<dyn TransactionStore>,
    daily_limit: Decimal,
}

impl DailySpendLimitRule {
    pub fn new(store: Arc<dyn TransactionStore>, daily_limit: Decimal) -> Self {
        Self { store, daily_limit }
    }
}

#[async_trait]
impl Rule for DailySpendLimitRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult> {
        let start_of_day = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();

        let todays = self
            .store
            .find_by_card_since(&request.card_id, start_of_day)
            .await?;

        let spent_today: Decimal = todays
            .iter()
            .filter(|auth| auth.status == AuthorizationStatus::Approved)
            .map(|auth| auth.amount.amount())
            .sum();

        let total = spent_today + request.amount.amount();
        if total > self.daily_limit {
            return Ok(RuleResult::Decline(format!(
                "Daily spend limit exceeded. Spent today: {}, Limit: {}",
                spent_today, self.daily_limit
            )));
        }

        Ok(RuleResult::Approve)
    }

    fn name(&self) -> &'static str {
        "DailySpendLimit"
    }
}
