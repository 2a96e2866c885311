use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use bank_adapters::BankError;
use card_core::store::StoreError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CardEngineError>;

/// Service error taxonomy. Authorization prefers persisted declines over
/// raising, so most of these surface only on the settlement and lifecycle
/// paths.
#[derive(Error, Debug)]
pub enum CardEngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    /// Clearing or reversal for a processor transaction the core has no
    /// mapping for. Returned as a 5xx so the processor retries.
    #[error("No mapping found for processor transaction: {0}")]
    UnknownTransaction(String),

    /// Duplicate idempotency key without a matching prior record. Should
    /// not occur when the decision cache is consulted first.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bank core error: {0}")]
    Bank(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl ResponseError for CardEngineError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CardEngineError::Validation(_) => StatusCode::BAD_REQUEST,
            CardEngineError::InvalidState(_) => StatusCode::BAD_REQUEST,
            CardEngineError::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            CardEngineError::NotFound(_) => StatusCode::NOT_FOUND,
            CardEngineError::SettlementFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CardEngineError::UnknownTransaction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CardEngineError::Conflict(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CardEngineError::Bank(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CardEngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for CardEngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(constraint) => CardEngineError::Conflict(constraint),
            StoreError::Backend(cause) => CardEngineError::Store(cause),
        }
    }
}

impl From<BankError> for CardEngineError {
    fn from(e: BankError) -> Self {
        match &e {
            BankError::InsufficientFunds { .. } => {
                CardEngineError::InsufficientFunds(e.to_string())
            }
            BankError::Core { .. } => CardEngineError::Bank(e.to_string()),
        }
    }
}

impl From<card_core::Error> for CardEngineError {
    fn from(e: card_core::Error) -> Self {
        use card_core::Error;
        match &e {
            Error::InvalidCardState { .. } | Error::InvalidTransition { .. } => {
                CardEngineError::InvalidState(e.to_string())
            }
            Error::CurrencyMismatch { .. }
            | Error::UnsupportedCurrency(_)
            | Error::AmountExceeded(_)
            | Error::InvalidIdempotencyKey(_)
            | Error::UnknownStatus(_) => CardEngineError::Validation(e.to_string()),
        }
    }
}

impl From<rules_engine::Error> for CardEngineError {
    fn from(e: rules_engine::Error) -> Self {
        match e {
            rules_engine::Error::Store(store) => store.into(),
        }
    }
}
