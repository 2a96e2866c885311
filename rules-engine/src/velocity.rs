//! Velocity control per card

use crate::engine::{Rule, RuleResult};
use crate::Result;
use async_trait::async_trait;
use card_core::authorization::AuthorizationRequest;
use card_core::store::TransactionStore;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Counts authorizations for the card in the trailing minute, any status,
/// and declines at the threshold (>=, not >). A burst of declines still
/// trips the rule; that is the point of a compromise detector.
pub struct VelocityRule {
    store: Arc<dyn TransactionStore>,
    max_per_minute: u32,
}

impl VelocityRule {
    pub fn new(store: Arc<dyn TransactionStore>, max_per_minute: u32) -> Self {
        Self {
            store,
            max_per_minute,
        }
    }
}

#[async_trait]
impl Rule for VelocityRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult> {
        let window_start = Utc::now() - Duration::seconds(60);

        let recent = self
            .store
            .find_by_card_since(&request.card_id, window_start)
            .await?
            .len();

        if recent >= self.max_per_minute as usize {
            return Ok(RuleResult::Decline(format!(
                "Velocity limit exceeded: {} transactions in last minute (max: {})",
                recent, self.max_per_minute
            )));
        }

        Ok(RuleResult::Approve)
    }

    fn name(&self) -> &'static str {
        "Velocity"
    }
}
