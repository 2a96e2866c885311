//! Rules Engine
//!
//! Ordered pipeline of independent policy rules evaluated against an
//! authorization request before any external resource is committed. The
//! first decline short-circuits and wins; running policy ahead of the CBS
//! call means a violation never costs an external round-trip.
//!
//! Adding a rule is implementing [`Rule`] and registering it on the
//! engine; the pipeline itself never changes.

pub mod config;
pub mod engine;
pub mod limits;
pub mod mcc;
pub mod velocity;

#[cfg(test)]
pub(crate) mod testutil;

use card_core::store::StoreError;
use thiserror::Error;

pub use config::RulesConfig;
pub use engine::{Rule, RuleResult, RulesEngine};
pub use limits::{DailySpendLimitRule, TransactionLimitRule};
pub use mcc::MccBlockingRule;
pub use velocity::VelocityRule;

/// Rule evaluation failure. Declines are not errors; this is for faults in
/// the queries a rule runs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;
