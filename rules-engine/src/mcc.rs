//! Merchant category blocking

use crate::engine::{Rule, RuleResult};
use crate::Result;
use async_trait::async_trait;
use card_core::authorization::AuthorizationRequest;
use std::collections::HashSet;

/// Declines authorizations whose MCC is on the configured blocklist.
/// Requests without an MCC pass.
pub struct MccBlockingRule {
    blocked: HashSet<String>,
}

impl MccBlockingRule {
    pub fn new(blocked: impl IntoIterator<Item = String>) -> Self {
        Self {
            blocked: blocked.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Rule for MccBlockingRule {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult> {
        if let Some(mcc) = &request.merchant.category_code {
            if self.blocked.contains(mcc) {
                return Ok(RuleResult::Decline(format!(
                    "Merchant category {} is blocked",
                    mcc
                )));
            }
        }
        Ok(RuleResult::Approve)
    }

    fn name(&self) -> &'static str {
        "MCCBlocking"
    }
}
