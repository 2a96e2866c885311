//! Postgres stores
//!
//! Hand-written SQL over `sqlx`. The unique indices declared in
//! `schema.sql` are load-bearing: idempotency-key races resolve through
//! constraint violations mapped to `StoreError::Duplicate`, and the
//! settlement pipeline serializes per-authorization work with
//! `SELECT ... FOR UPDATE`.

use crate::models::{
    AuthorizationRow, CardRow, HoldRow, LedgerEntryRow, MappingRow, ProcessorMappingRow,
};
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use bank_adapters::fineract::holds::{HoldRecord, HoldStore};
use card_core::authorization::Authorization;
use card_core::card::Card;
use card_core::ledger::LedgerEntry;
use card_core::mapping::{BankAccountMapping, ProcessorTransactionMapping};
use card_core::store::{
    CardStore, MappingStore, ProcessorMappingStore, StoreError, StoreResult, StoreTx,
    TransactionStore,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;
use std::time::Duration;

const AUTHORIZATION_COLUMNS: &str = "authorization_id, card_id, account_ref, amount, currency, \
     cleared_amount, cleared_currency, status, merchant_name, merchant_category_code, \
     merchant_city, merchant_country, decline_reason, idempotency_key, created_at, updated_at";

const LEDGER_COLUMNS: &str = "transaction_id, account_ref, entry_type, amount, currency, \
     transaction_type, authorization_id, card_id, description, idempotency_key, created_at";

fn map_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(
                db.constraint().unwrap_or("unique constraint").to_string(),
            );
        }
    }
    StoreError::Backend(e.to_string())
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> AnyResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> AnyResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionStore for PgStores {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(map_err)?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn find_authorization(
        &self,
        authorization_id: &str,
    ) -> StoreResult<Option<Authorization>> {
        let row = sqlx::query_as::<_, AuthorizationRow>(&format!(
            "SELECT {} FROM authorizations WHERE authorization_id = $1",
            AUTHORIZATION_COLUMNS
        ))
        .bind(authorization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.map(Authorization::try_from).transpose()
    }

    async fn find_by_card_since(
        &self,
        card_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<Authorization>> {
        let rows = sqlx::query_as::<_, AuthorizationRow>(&format!(
            "SELECT {} FROM authorizations WHERE card_id = $1 AND created_at >= $2 \
             ORDER BY created_at",
            AUTHORIZATION_COLUMNS
        ))
        .bind(card_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(map_err)?;

        rows.into_iter().map(Authorization::try_from).collect()
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn find_by_idempotency_key(&mut self, key: &str) -> StoreResult<Option<Authorization>> {
        let row = sqlx::query_as::<_, AuthorizationRow>(&format!(
            "SELECT {} FROM authorizations WHERE idempotency_key = $1",
            AUTHORIZATION_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_err)?;

        row.map(Authorization::try_from).transpose()
    }

    async fn find_for_update(
        &mut self,
        authorization_id: &str,
    ) -> StoreResult<Option<Authorization>> {
        let row = sqlx::query_as::<_, AuthorizationRow>(&format!(
            "SELECT {} FROM authorizations WHERE authorization_id = $1 FOR UPDATE",
            AUTHORIZATION_COLUMNS
        ))
        .bind(authorization_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_err)?;

        row.map(Authorization::try_from).transpose()
    }

    async fn insert_authorization(&mut self, authorization: &Authorization) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO authorizations (authorization_id, card_id, account_ref, amount, \
             currency, cleared_amount, cleared_currency, status, merchant_name, \
             merchant_category_code, merchant_city, merchant_country, decline_reason, \
             idempotency_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(&authorization.authorization_id)
        .bind(&authorization.card_id)
        .bind(&authorization.account_ref)
        .bind(authorization.amount.amount())
        .bind(authorization.amount.currency().to_string())
        .bind(authorization.cleared_amount.map(|m| m.amount()))
        .bind(authorization.cleared_amount.map(|m| m.currency().to_string()))
        .bind(authorization.status.to_string())
        .bind(&authorization.merchant.name)
        .bind(&authorization.merchant.category_code)
        .bind(&authorization.merchant.city)
        .bind(&authorization.merchant.country)
        .bind(&authorization.decline_reason)
        .bind(&authorization.idempotency_key)
        .bind(authorization.created_at)
        .bind(authorization.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(())
    }

    async fn update_authorization(&mut self, authorization: &Authorization) -> StoreResult<()> {
        sqlx::query(
            "UPDATE authorizations SET status = $1, cleared_amount = $2, cleared_currency = $3, \
             decline_reason = $4, updated_at = $5 WHERE authorization_id = $6",
        )
        .bind(authorization.status.to_string())
        .bind(authorization.cleared_amount.map(|m| m.amount()))
        .bind(authorization.cleared_amount.map(|m| m.currency().to_string()))
        .bind(&authorization.decline_reason)
        .bind(authorization.updated_at)
        .bind(&authorization.authorization_id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(())
    }

    async fn find_ledger_by_idempotency_key(
        &mut self,
        key: &str,
    ) -> StoreResult<Option<LedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerEntryRow>(&format!(
            "SELECT {} FROM ledger_entries WHERE idempotency_key = $1",
            LEDGER_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_err)?;

        row.map(LedgerEntry::try_from).transpose()
    }

    async fn append_ledger(&mut self, entry: &LedgerEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO ledger_entries (transaction_id, account_ref, entry_type, amount, \
             currency, transaction_type, authorization_id, card_id, description, \
             idempotency_key, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&entry.transaction_id)
        .bind(&entry.account_ref)
        .bind(entry.entry_type.to_string())
        .bind(entry.amount.amount())
        .bind(entry.amount.currency().to_string())
        .bind(entry.transaction_type.to_string())
        .bind(&entry.authorization_id)
        .bind(&entry.card_id)
        .bind(&entry.description)
        .bind(&entry.idempotency_key)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_err)
    }
}

#[async_trait]
impl CardStore for PgStores {
    async fn find_by_card_id(&self, card_id: &str) -> StoreResult<Option<Card>> {
        let row = sqlx::query_as::<_, CardRow>(
            "SELECT card_id, cardholder_name, last4, expiration_date, state, owner_id, \
             created_at, updated_at FROM cards WHERE card_id = $1",
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.map(Card::try_from).transpose()
    }

    async fn find_by_last4(&self, last4: &str) -> StoreResult<Option<Card>> {
        let row = sqlx::query_as::<_, CardRow>(
            "SELECT card_id, cardholder_name, last4, expiration_date, state, owner_id, \
             created_at, updated_at FROM cards WHERE last4 = $1 ORDER BY created_at LIMIT 1",
        )
        .bind(last4)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.map(Card::try_from).transpose()
    }

    async fn insert(&self, card: &Card) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO cards (card_id, cardholder_name, last4, expiration_date, state, \
             owner_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&card.card_id)
        .bind(&card.cardholder_name)
        .bind(&card.last4)
        .bind(card.expiration_date)
        .bind(card.state.to_string())
        .bind(&card.owner_id)
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(())
    }

    async fn update(&self, card: &Card) -> StoreResult<()> {
        // Row lock, then write: card state changes serialize per card.
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query("SELECT card_id FROM cards WHERE card_id = $1 FOR UPDATE")
            .bind(&card.card_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_err)?;

        sqlx::query("UPDATE cards SET state = $1, updated_at = $2 WHERE card_id = $3")
            .bind(card.state.to_string())
            .bind(card.updated_at)
            .bind(&card.card_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        tx.commit().await.map_err(map_err)
    }
}

#[async_trait]
impl MappingStore for PgStores {
    async fn find_by_card_id(&self, card_id: &str) -> StoreResult<Option<BankAccountMapping>> {
        let row = sqlx::query_as::<_, MappingRow>(
            "SELECT id, card_id, bank_client_ref, bank_account_ref, bank_core_type, \
             created_at, created_by FROM bank_account_mappings WHERE card_id = $1",
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(row.map(BankAccountMapping::from))
    }

    async fn insert(&self, mapping: &BankAccountMapping) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO bank_account_mappings (id, card_id, bank_client_ref, \
             bank_account_ref, bank_core_type, created_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(mapping.id)
        .bind(&mapping.card_id)
        .bind(&mapping.bank_client_ref)
        .bind(&mapping.bank_account_ref)
        .bind(&mapping.bank_core_type)
        .bind(mapping.created_at)
        .bind(&mapping.created_by)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(())
    }
}

#[async_trait]
impl ProcessorMappingStore for PgStores {
    async fn find_by_processor_transaction_id(
        &self,
        processor_transaction_id: &str,
    ) -> StoreResult<Option<ProcessorTransactionMapping>> {
        let row = sqlx::query_as::<_, ProcessorMappingRow>(
            "SELECT processor_transaction_id, internal_authorization_id, card_token, \
             processor_name, created_at FROM processor_transaction_mappings \
             WHERE processor_transaction_id = $1",
        )
        .bind(processor_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(row.map(ProcessorTransactionMapping::from))
    }

    async fn insert(&self, mapping: &ProcessorTransactionMapping) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO processor_transaction_mappings (processor_transaction_id, \
             internal_authorization_id, card_token, processor_name, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&mapping.processor_transaction_id)
        .bind(&mapping.internal_authorization_id)
        .bind(&mapping.card_token)
        .bind(&mapping.processor_name)
        .bind(mapping.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(())
    }
}

#[async_trait]
impl HoldStore for PgStores {
    async fn find(&self, authorization_id: &str) -> StoreResult<Option<HoldRecord>> {
        let row = sqlx::query_as::<_, HoldRow>(
            "SELECT authorization_id, account_ref, journal_entry_id, amount, currency, \
             status, created_at, updated_at FROM fineract_auth_holds \
             WHERE authorization_id = $1",
        )
        .bind(authorization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;

        row.map(HoldRecord::try_from).transpose()
    }

    async fn insert(&self, hold: &HoldRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO fineract_auth_holds (authorization_id, account_ref, \
             journal_entry_id, amount, currency, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&hold.authorization_id)
        .bind(&hold.account_ref)
        .bind(&hold.journal_entry_id)
        .bind(hold.amount)
        .bind(hold.currency.to_string())
        .bind(hold.status.to_string())
        .bind(hold.created_at)
        .bind(hold.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(())
    }

    async fn update(&self, hold: &HoldRecord) -> StoreResult<()> {
        sqlx::query(
            "UPDATE fineract_auth_holds SET status = $1, updated_at = $2 \
             WHERE authorization_id = $3",
        )
        .bind(hold.status.to_string())
        .bind(hold.updated_at)
        .bind(&hold.authorization_id)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;

        Ok(())
    }
}
