//! Fineract wire shapes
//!
//! Request/response bodies for the Fineract API calls the adapter makes.
//! Field names follow the Fineract JSON convention (camelCase).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance section of a savings account response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub available_balance: Decimal,
    pub currency: String,
}

/// One leg of a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlAmount {
    pub gl_account_id: i64,
    pub amount: Decimal,
}

/// Double-entry journal posting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntryRequest {
    pub office_id: i64,
    pub transaction_date: String,
    pub reference_number: String,
    pub comments: String,
    pub debits: Vec<GlAmount>,
    pub credits: Vec<GlAmount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntryResponse {
    pub transaction_id: String,
}

/// Savings withdrawal/deposit body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsTransactionRequest {
    pub transaction_date: String,
    pub transaction_amount: Decimal,
    pub note: String,
    pub reference_number: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsTransactionResponse {
    pub resource_id: Option<i64>,
}
