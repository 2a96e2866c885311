//! API request/response shapes and relational row types

use card_core::authorization::{Authorization, AuthorizationResponse, Merchant};
use card_core::card::Card;
use card_core::ledger::LedgerEntry;
use card_core::mapping::{BankAccountMapping, ProcessorTransactionMapping};
use card_core::money::Money;
use card_core::store::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =========================================================================
// API DTOS
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeTransactionRequest {
    pub card_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub merchant_name: String,
    pub merchant_category_code: Option<String>,
    pub merchant_city: Option<String>,
    pub merchant_country: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationApiResponse {
    pub authorization_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
}

impl From<AuthorizationResponse> for AuthorizationApiResponse {
    fn from(response: AuthorizationResponse) -> Self {
        Self {
            authorization_id: response.authorization_id,
            status: response.status.to_string(),
            decline_reason: response.decline_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    pub bank_client_ref: String,
    pub bank_account_ref: String,
    pub cardholder_name: String,
    pub expiration_date: NaiveDate,
    pub issued_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardApiResponse {
    pub card_id: String,
    pub cardholder_name: String,
    pub last4: String,
    pub expiration_date: NaiveDate,
    pub state: String,
    pub owner_id: String,
}

impl From<Card> for CardApiResponse {
    fn from(card: Card) -> Self {
        Self {
            card_id: card.card_id,
            cardholder_name: card.cardholder_name,
            last4: card.last4,
            expiration_date: card.expiration_date,
            state: card.state.to_string(),
            owner_id: card.owner_id,
        }
    }
}

/// `?amount&currency` on the settlement clear/reverse endpoints.
#[derive(Debug, Deserialize)]
pub struct SettlementAmountQuery {
    pub amount: Decimal,
    pub currency: String,
}

// =========================================================================
// ROW TYPES (hand-written SQL binds into these)
// =========================================================================

fn parse<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Backend(format!("corrupt {} column: {}", what, e)))
}

fn money(amount: Decimal, currency: &str) -> Result<Money, StoreError> {
    Ok(Money::new(amount, parse(currency, "currency")?))
}

#[derive(Debug, FromRow)]
pub struct AuthorizationRow {
    pub authorization_id: String,
    pub card_id: String,
    pub account_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub cleared_amount: Option<Decimal>,
    pub cleared_currency: Option<String>,
    pub status: String,
    pub merchant_name: String,
    pub merchant_category_code: Option<String>,
    pub merchant_city: Option<String>,
    pub merchant_country: Option<String>,
    pub decline_reason: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AuthorizationRow> for Authorization {
    type Error = StoreError;

    fn try_from(row: AuthorizationRow) -> Result<Self, StoreError> {
        let cleared_amount = match (row.cleared_amount, row.cleared_currency.as_deref()) {
            (Some(amount), Some(currency)) => Some(money(amount, currency)?),
            _ => None,
        };
        Ok(Authorization {
            amount: money(row.amount, &row.currency)?,
            cleared_amount,
            status: parse(&row.status, "status")?,
            authorization_id: row.authorization_id,
            card_id: row.card_id,
            account_ref: row.account_ref,
            merchant: Merchant {
                name: row.merchant_name,
                category_code: row.merchant_category_code,
                city: row.merchant_city,
                country: row.merchant_country,
            },
            decline_reason: row.decline_reason,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct LedgerEntryRow {
    pub transaction_id: String,
    pub account_ref: String,
    pub entry_type: String,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_type: String,
    pub authorization_id: Option<String>,
    pub card_id: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LedgerEntryRow> for LedgerEntry {
    type Error = StoreError;

    fn try_from(row: LedgerEntryRow) -> Result<Self, StoreError> {
        Ok(LedgerEntry {
            amount: money(row.amount, &row.currency)?,
            entry_type: parse(&row.entry_type, "entry_type")?,
            transaction_type: parse(&row.transaction_type, "transaction_type")?,
            transaction_id: row.transaction_id,
            account_ref: row.account_ref,
            authorization_id: row.authorization_id,
            card_id: row.card_id,
            description: row.description,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct CardRow {
    pub card_id: String,
    pub cardholder_name: String,
    pub last4: String,
    pub expiration_date: NaiveDate,
    pub state: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CardRow> for Card {
    type Error = StoreError;

    fn try_from(row: CardRow) -> Result<Self, StoreError> {
        Ok(Card {
            state: parse(&row.state, "state")?,
            card_id: row.card_id,
            cardholder_name: row.cardholder_name,
            last4: row.last4,
            expiration_date: row.expiration_date,
            owner_id: row.owner_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct MappingRow {
    pub id: Uuid,
    pub card_id: String,
    pub bank_client_ref: String,
    pub bank_account_ref: String,
    pub bank_core_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl From<MappingRow> for BankAccountMapping {
    fn from(row: MappingRow) -> Self {
        BankAccountMapping {
            id: row.id,
            card_id: row.card_id,
            bank_client_ref: row.bank_client_ref,
            bank_account_ref: row.bank_account_ref,
            bank_core_type: row.bank_core_type,
            created_at: row.created_at,
            created_by: row.created_by,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ProcessorMappingRow {
    pub processor_transaction_id: String,
    pub internal_authorization_id: String,
    pub card_token: String,
    pub processor_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<ProcessorMappingRow> for ProcessorTransactionMapping {
    fn from(row: ProcessorMappingRow) -> Self {
        ProcessorTransactionMapping {
            processor_transaction_id: row.processor_transaction_id,
            internal_authorization_id: row.internal_authorization_id,
            card_token: row.card_token,
            processor_name: row.processor_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct HoldRow {
    pub authorization_id: String,
    pub account_ref: String,
    pub journal_entry_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<HoldRow> for bank_adapters::fineract::holds::HoldRecord {
    type Error = StoreError;

    fn try_from(row: HoldRow) -> Result<Self, StoreError> {
        Ok(Self {
            currency: parse(&row.currency, "currency")?,
            status: row
                .status
                .parse()
                .map_err(|e: String| StoreError::Backend(e))?,
            authorization_id: row.authorization_id,
            account_ref: row.account_ref,
            journal_entry_id: row.journal_entry_id,
            amount: row.amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
