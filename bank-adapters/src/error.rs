//! Adapter error taxonomy

use card_core::money::Money;
use thiserror::Error;

/// CBS-side failure. `InsufficientFunds` is the one business outcome; the
/// authorization pipeline converts it to a decline. Everything else,
/// timeouts included, is a `Core` fault.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("Insufficient funds in {account_ref}: required {required}, available {available}")]
    InsufficientFunds {
        account_ref: String,
        required: Money,
        available: Money,
    },

    #[error("Bank core error in {op} for {account_ref}: {cause}")]
    Core {
        account_ref: String,
        op: &'static str,
        cause: String,
    },
}

impl BankError {
    pub fn core(account_ref: &str, op: &'static str, cause: impl ToString) -> Self {
        BankError::Core {
            account_ref: account_ref.to_string(),
            op,
            cause: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
