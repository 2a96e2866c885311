//! Card Orchestration Core — domain types
//!
//! Shared value objects, entities and store contracts for the card
//! orchestration core. The core sits between a card processor and an
//! external core banking system (CBS): cards are payment instruments
//! mapped to pre-existing CBS accounts, and the CBS stays the
//! authoritative ledger for money. Nothing in this crate mirrors a
//! balance.

pub mod authorization;
pub mod card;
pub mod error;
pub mod idempotency;
pub mod ledger;
pub mod mapping;
pub mod money;
pub mod store;

pub use authorization::{Authorization, AuthorizationRequest, AuthorizationResponse, AuthorizationStatus};
pub use card::{Card, CardState};
pub use error::{Error, Result};
pub use ledger::{EntryType, LedgerEntry, TransactionType};
pub use mapping::{BankAccountMapping, ProcessorTransactionMapping};
pub use money::{Currency, Money};
pub use store::{
    CardStore, MappingStore, ProcessorMappingStore, StoreError, StoreTx, TransactionStore,
};
