//! Immutable correlation mappings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Link from a card to the CBS client/account that backs it. Created once
/// at issuance and never modified; one card maps to exactly one account,
/// many cards may share an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountMapping {
    pub id: Uuid,
    pub card_id: String,
    pub bank_client_ref: String,
    pub bank_account_ref: String,
    /// Adapter name the mapping was created under (free form).
    pub bank_core_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl BankAccountMapping {
    pub fn new(
        card_id: impl Into<String>,
        bank_client_ref: impl Into<String>,
        bank_account_ref: impl Into<String>,
        bank_core_type: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id: card_id.into(),
            bank_client_ref: bank_client_ref.into(),
            bank_account_ref: bank_account_ref.into(),
            bank_core_type: bank_core_type.into(),
            created_at: Utc::now(),
            created_by: created_by.into(),
        }
    }
}

/// Correlation between a processor's transaction id and the internal
/// authorization id, written only after an approved authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorTransactionMapping {
    pub processor_transaction_id: String,
    pub internal_authorization_id: String,
    pub card_token: String,
    pub processor_name: String,
    pub created_at: DateTime<Utc>,
}

impl ProcessorTransactionMapping {
    pub fn new(
        processor_transaction_id: impl Into<String>,
        internal_authorization_id: impl Into<String>,
        card_token: impl Into<String>,
        processor_name: impl Into<String>,
    ) -> Self {
        Self {
            processor_transaction_id: processor_transaction_id.into(),
            internal_authorization_id: internal_authorization_id.into(),
            card_token: card_token.into(),
            processor_name: processor_name.into(),
            created_at: Utc::now(),
        }
    }
}
