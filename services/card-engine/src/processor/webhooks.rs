//! Processor webhook payloads
//!
//! Wire shapes for the events a card processor delivers: authorization at
//! purchase time, clearing when the transaction settles, reversal on
//! refund or cancellation. The processor supplies the idempotency key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantInfo {
    pub name: String,
    pub category_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationWebhook {
    pub processor_transaction_id: String,
    /// Tokenized card identifier; never a PAN.
    pub card_token: String,
    pub amount: Decimal,
    pub currency: String,
    pub merchant: MerchantInfo,
    pub timestamp: Option<DateTime<Utc>>,
    pub idempotency_key: String,
}

/// Settlement usually arrives one to three days after authorization; the
/// settled amount may differ from the authorized amount.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearingWebhook {
    pub processor_transaction_id: String,
    pub settled_amount: Decimal,
    pub currency: String,
    pub settlement_date: Option<DateTime<Utc>>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReversalWebhook {
    pub processor_transaction_id: String,
    pub reversal_amount: Decimal,
    pub currency: String,
    pub reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub idempotency_key: String,
}

/// Response format the processor expects on authorization events.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
    pub response_time: DateTime<Utc>,
}

impl ProcessorResponse {
    pub fn approved(authorization_code: impl Into<String>) -> Self {
        Self {
            status: "APPROVED".to_string(),
            authorization_code: Some(authorization_code.into()),
            decline_reason: None,
            response_time: Utc::now(),
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            status: "DECLINED".to_string(),
            authorization_code: None,
            decline_reason: Some(reason.into()),
            response_time: Utc::now(),
        }
    }
}
