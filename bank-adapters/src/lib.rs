//! Bank Adapters
//!
//! The vendor-neutral contract between the card orchestration core and an
//! external core banking system (CBS), plus two implementations: an
//! in-memory mock for tests and development, and an Apache Fineract
//! adapter that emulates authorization holds with shadow journal entries.
//!
//! The CBS is the authoritative ledger. Adapters reserve, commit and
//! release funds there; the core never mirrors a balance.

pub mod error;
pub mod fineract;
pub mod mock;

use async_trait::async_trait;
use card_core::money::Money;

pub use error::{BankError, Result};
pub use fineract::{FineractAdapter, FineractConfig};
pub use mock::MockBankAdapter;

/// Contract against the CBS. All operations are synchronous from the
/// caller's perspective and idempotent on `reference_id`; the adapter is
/// the only required external dependency on the authorization path.
#[async_trait]
pub trait BankAccountAdapter: Send + Sync {
    /// Real-time available balance: total minus live holds.
    async fn available_balance(&self, account_ref: &str) -> Result<Money>;

    /// Reserve `amount`. A second call with the same `reference_id`
    /// succeeds without placing a second hold. On success the reported
    /// available balance drops by exactly `amount` with no debit
    /// observable yet.
    async fn place_hold(&self, account_ref: &str, amount: Money, reference_id: &str)
        -> Result<()>;

    /// Finalize the debit tied to a previously placed hold. Partial
    /// commits up to the held amount are allowed; exceeding it or
    /// committing without a hold is a structured error. Repeats after a
    /// commit are no-ops.
    async fn commit_debit(&self, account_ref: &str, amount: Money, reference_id: &str)
        -> Result<()>;

    /// Cancel the hold without debiting. Safe to call when no hold
    /// exists.
    async fn release_hold(&self, account_ref: &str, amount: Money, reference_id: &str)
        -> Result<()>;

    /// For observability only; never on the authorization path.
    fn adapter_name(&self) -> &'static str;

    async fn is_healthy(&self) -> bool;
}
