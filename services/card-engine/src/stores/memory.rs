//! In-memory stores
//!
//! Backs tests and adapterless development. Writes inside a unit of work
//! are staged and applied atomically at commit, where the same unique
//! keys the database enforces are checked; dropping the handle discards
//! the staged writes.

use async_trait::async_trait;
use card_core::authorization::Authorization;
use card_core::card::Card;
use card_core::ledger::LedgerEntry;
use card_core::mapping::{BankAccountMapping, ProcessorTransactionMapping};
use card_core::store::{
    CardStore, MappingStore, ProcessorMappingStore, StoreError, StoreResult, StoreTx,
    TransactionStore,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    // authorization_id -> record
    authorizations: HashMap<String, Authorization>,
    // idempotency_key -> authorization_id
    authorization_keys: HashMap<String, String>,
    ledger: Vec<LedgerEntry>,
    // idempotency_key -> index into ledger
    ledger_keys: HashMap<String, usize>,
    cards: HashMap<String, Card>,
    // card_id -> mapping
    mappings: HashMap<String, BankAccountMapping>,
    processor_mappings: HashMap<String, ProcessorTransactionMapping>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.inner.read().await.ledger.clone()
    }
}

enum Staged {
    InsertAuthorization(Authorization),
    UpdateAuthorization(Authorization),
    AppendLedger(LedgerEntry),
}

pub struct MemoryTx {
    inner: Arc<RwLock<Inner>>,
    staged: Vec<Staged>,
}

impl MemoryTx {
    fn staged_authorization<P>(&self, predicate: P) -> Option<Authorization>
    where
        P: Fn(&Authorization) -> bool,
    {
        self.staged.iter().rev().find_map(|op| match op {
            Staged::InsertAuthorization(a) | Staged::UpdateAuthorization(a) if predicate(a) => {
                Some(a.clone())
            }
            _ => None,
        })
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_by_idempotency_key(&mut self, key: &str) -> StoreResult<Option<Authorization>> {
        if let Some(found) = self.staged_authorization(|a| a.idempotency_key == key) {
            return Ok(Some(found));
        }
        let inner = self.inner.read().await;
        Ok(inner
            .authorization_keys
            .get(key)
            .and_then(|id| inner.authorizations.get(id))
            .cloned())
    }

    async fn find_for_update(
        &mut self,
        authorization_id: &str,
    ) -> StoreResult<Option<Authorization>> {
        if let Some(found) = self.staged_authorization(|a| a.authorization_id == authorization_id)
        {
            return Ok(Some(found));
        }
        Ok(self
            .inner
            .read()
            .await
            .authorizations
            .get(authorization_id)
            .cloned())
    }

    async fn insert_authorization(&mut self, authorization: &Authorization) -> StoreResult<()> {
        self.staged
            .push(Staged::InsertAuthorization(authorization.clone()));
        Ok(())
    }

    async fn update_authorization(&mut self, authorization: &Authorization) -> StoreResult<()> {
        self.staged
            .push(Staged::UpdateAuthorization(authorization.clone()));
        Ok(())
    }

    async fn find_ledger_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> StoreResult<Option<LedgerEntry>> {
        for op in self.staged.iter().rev() {
            if let Staged::AppendLedger(entry) = op {
                if entry.idempotency_key == key {
                    return Ok(Some(entry.clone()));
                }
            }
        }
        let inner = self.inner.read().await;
        Ok(inner
            .ledger_keys
            .get(key)
            .and_then(|index| inner.ledger.get(*index))
            .cloned())
    }

    async fn append_ledger(&mut self, entry: &LedgerEntry) -> StoreResult<()> {
        self.staged.push(Staged::AppendLedger(entry.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut inner = self.inner.write().await;

        // Validate every staged write against the unique keys before
        // applying any of them, mirroring constraint checks in one
        // database transaction.
        for op in &self.staged {
            match op {
                Staged::InsertAuthorization(a) => {
                    if inner.authorizations.contains_key(&a.authorization_id) {
                        return Err(StoreError::Duplicate(format!(
                            "authorizations.authorization_id: {}",
                            a.authorization_id
                        )));
                    }
                    if inner.authorization_keys.contains_key(&a.idempotency_key) {
                        return Err(StoreError::Duplicate(format!(
                            "authorizations.idempotency_key: {}",
                            a.idempotency_key
                        )));
                    }
                }
                Staged::AppendLedger(entry) => {
                    if inner.ledger_keys.contains_key(&entry.idempotency_key) {
                        return Err(StoreError::Duplicate(format!(
                            "ledger_entries.idempotency_key: {}",
                            entry.idempotency_key
                        )));
                    }
                }
                Staged::UpdateAuthorization(_) => {}
            }
        }

        for op in self.staged {
            match op {
                Staged::InsertAuthorization(a) => {
                    inner
                        .authorization_keys
                        .insert(a.idempotency_key.clone(), a.authorization_id.clone());
                    inner.authorizations.insert(a.authorization_id.clone(), a);
                }
                Staged::UpdateAuthorization(a) => {
                    inner.authorizations.insert(a.authorization_id.clone(), a);
                }
                Staged::AppendLedger(entry) => {
                    let index = inner.ledger.len();
                    inner
                        .ledger_keys
                        .insert(entry.idempotency_key.clone(), index);
                    inner.ledger.push(entry);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            staged: Vec::new(),
        }))
    }

    async fn find_authorization(
        &self,
        authorization_id: &str,
    ) -> StoreResult<Option<Authorization>> {
        Ok(self
            .inner
            .read()
            .await
            .authorizations
            .get(authorization_id)
            .cloned())
    }

    async fn find_by_card_since(
        &self,
        card_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Authorization>> {
        Ok(self
            .inner
            .read()
            .await
            .authorizations
            .values()
            .filter(|a| a.card_id == card_id && a.created_at >= since)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CardStore for MemoryStore {
    async fn find_by_card_id(&self, card_id: &str) -> StoreResult<Option<Card>> {
        Ok(self.inner.read().await.cards.get(card_id).cloned())
    }

    async fn find_by_last4(&self, last4: &str) -> StoreResult<Option<Card>> {
        Ok(self
            .inner
            .read()
            .await
            .cards
            .values()
            .find(|card| card.last4 == last4)
            .cloned())
    }

    async fn insert(&self, card: &Card) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.cards.contains_key(&card.card_id) {
            return Err(StoreError::Duplicate(format!(
                "cards.card_id: {}",
                card.card_id
            )));
        }
        inner.cards.insert(card.card_id.clone(), card.clone());
        Ok(())
    }

    async fn update(&self, card: &Card) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .cards
            .insert(card.card_id.clone(), card.clone());
        Ok(())
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn find_by_card_id(&self, card_id: &str) -> StoreResult<Option<BankAccountMapping>> {
        Ok(self.inner.read().await.mappings.get(card_id).cloned())
    }

    async fn insert(&self, mapping: &BankAccountMapping) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.mappings.contains_key(&mapping.card_id) {
            return Err(StoreError::Duplicate(format!(
                "bank_account_mappings.card_id: {}",
                mapping.card_id
            )));
        }
        inner
            .mappings
            .insert(mapping.card_id.clone(), mapping.clone());
        Ok(())
    }
}

#[async_trait]
impl ProcessorMappingStore for MemoryStore {
    async fn find_by_processor_transaction_id(
        &self,
        processor_transaction_id: &str,
    ) -> StoreResult<Option<ProcessorTransactionMapping>> {
        Ok(self
            .inner
            .read()
            .await
            .processor_mappings
            .get(processor_transaction_id)
            .cloned())
    }

    async fn insert(&self, mapping: &ProcessorTransactionMapping) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner
            .processor_mappings
            .contains_key(&mapping.processor_transaction_id)
        {
            return Err(StoreError::Duplicate(format!(
                "processor_transaction_mappings.processor_transaction_id: {}",
                mapping.processor_transaction_id
            )));
        }
        inner
            .processor_mappings
            .insert(mapping.processor_transaction_id.clone(), mapping.clone());
        Ok(())
    }
}
