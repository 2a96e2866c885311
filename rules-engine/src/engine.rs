//! Rule contract and the ordered evaluation pipeline

use crate::config::RulesConfig;
use crate::limits::{DailySpendLimitRule, TransactionLimitRule};
use crate::mcc::MccBlockingRule;
use crate::velocity::VelocityRule;
use crate::Result;
use async_trait::async_trait;
use card_core::authorization::AuthorizationRequest;
use card_core::store::TransactionStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a single rule or of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    Approve,
    Decline(String),
}

impl RuleResult {
    pub fn is_approved(&self) -> bool {
        matches!(self, RuleResult::Approve)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RuleResult::Approve => None,
            RuleResult::Decline(reason) => Some(reason),
        }
    }
}

/// A policy rule. Stateless apart from queries against the authorization
/// store it was constructed with; its input is the full request.
#[async_trait]
pub trait Rule: Send + Sync {
    async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult>;

    fn name(&self) -> &'static str;
}

/// Evaluates rules in registration order; the first decline wins.
pub struct RulesEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RulesEngine {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// The built-in rule set in its standard order: transaction limit,
    /// daily spend, MCC blocking, velocity.
    pub fn standard(store: Arc<dyn TransactionStore>, config: &RulesConfig) -> Self {
        Self::new(vec![
            Box::new(TransactionLimitRule::new(config.transaction_limit_default)),
            Box::new(DailySpendLimitRule::new(
                store.clone(),
                config.daily_limit_default,
            )),
            Box::new(MccBlockingRule::new(config.blocked_mccs.iter().cloned())),
            Box::new(VelocityRule::new(store, config.velocity_max_per_minute)),
        ])
    }

    pub async fn evaluate(&self, request: &AuthorizationRequest) -> Result<RuleResult> {
        debug!(
            "Evaluating {} rules for card {}",
            self.rules.len(),
            request.card_id
        );

        for rule in &self.rules {
            let result = rule.evaluate(request).await?;
            if let RuleResult::Decline(reason) = &result {
                info!("Rule {} declined authorization: {}", rule.name(), reason);
                return Ok(result);
            }
            debug!("Rule {} approved", rule.name());
        }

        Ok(RuleResult::Approve)
    }
}
