//! Error types for the domain layer

use crate::authorization::AuthorizationStatus;
use crate::card::CardState;
use crate::money::Currency;
use thiserror::Error;

/// Domain error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Arithmetic or comparison between different currencies
    #[error("Currency mismatch: {left} and {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    /// Currency code outside the supported set
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Card lifecycle operation not allowed in the current state
    #[error("Card {card_id} cannot {operation} from state {state}")]
    InvalidCardState {
        card_id: String,
        state: CardState,
        operation: &'static str,
    },

    /// Authorization status transition not allowed
    #[error("Cannot {operation} authorization in state {status}")]
    InvalidTransition {
        status: AuthorizationStatus,
        operation: &'static str,
    },

    /// Amount constraint violated (clearing > authorized, reversal > cleared)
    #[error("{0}")]
    AmountExceeded(String),

    /// Malformed idempotency key
    #[error("Invalid idempotency key: {0}")]
    InvalidIdempotencyKey(String),

    /// Status string outside the known set
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
