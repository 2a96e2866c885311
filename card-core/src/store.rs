//! Store contracts
//!
//! Repository capabilities per entity, bound to a relational driver by the
//! service. Pipeline atomicity is explicit: `TransactionStore::begin`
//! hands out a unit-of-work handle that is threaded through the pipeline
//! and committed at the entrypoint. Dropping the handle rolls back.

use crate::authorization::Authorization;
use crate::card::Card;
use crate::ledger::LedgerEntry;
use crate::mapping::{BankAccountMapping, ProcessorTransactionMapping};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Storage failure taxonomy. `Duplicate` maps unique-constraint violations
/// so losing writers of an idempotency-key race can be told apart from
/// backend faults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Authorization + ledger store. The unit of work spans both because the
/// pipelines write them together.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Open a unit of work. All writes inside it commit or roll back as
    /// one.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    async fn find_authorization(&self, authorization_id: &str)
        -> StoreResult<Option<Authorization>>;

    /// Authorizations for a card created at or after `since`, any status.
    /// The rules engine filters and aggregates on top of this.
    async fn find_by_card_since(
        &self,
        card_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Authorization>>;
}

/// Unit-of-work handle over the authorization and ledger tables.
#[async_trait]
pub trait StoreTx: Send {
    async fn find_by_idempotency_key(&mut self, key: &str)
        -> StoreResult<Option<Authorization>>;

    /// Row-locked read; later writers for the same authorization block
    /// until this unit of work finishes.
    async fn find_for_update(&mut self, authorization_id: &str)
        -> StoreResult<Option<Authorization>>;

    async fn insert_authorization(&mut self, authorization: &Authorization) -> StoreResult<()>;

    async fn update_authorization(&mut self, authorization: &Authorization) -> StoreResult<()>;

    async fn find_ledger_by_idempotency_key(&mut self, key: &str)
        -> StoreResult<Option<LedgerEntry>>;

    async fn append_ledger(&mut self, entry: &LedgerEntry) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait CardStore: Send + Sync {
    async fn find_by_card_id(&self, card_id: &str) -> StoreResult<Option<Card>>;

    /// Token lookup for the inbound processor adapter (the display suffix
    /// doubles as the card token in this implementation).
    async fn find_by_last4(&self, last4: &str) -> StoreResult<Option<Card>>;

    async fn insert(&self, card: &Card) -> StoreResult<()>;

    async fn update(&self, card: &Card) -> StoreResult<()>;
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_by_card_id(&self, card_id: &str) -> StoreResult<Option<BankAccountMapping>>;

    async fn insert(&self, mapping: &BankAccountMapping) -> StoreResult<()>;
}

#[async_trait]
pub trait ProcessorMappingStore: Send + Sync {
    async fn find_by_processor_transaction_id(
        &self,
        processor_transaction_id: &str,
    ) -> StoreResult<Option<ProcessorTransactionMapping>>;

    async fn insert(&self, mapping: &ProcessorTransactionMapping) -> StoreResult<()>;
}
