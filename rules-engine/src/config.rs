//! Rule configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Limits and blocklists for the built-in rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Per-transaction cap in the presented currency.
    pub transaction_limit_default: Decimal,

    /// Per-card cap per UTC day, summed over approved authorizations.
    pub daily_limit_default: Decimal,

    /// Authorizations per card per rolling minute.
    pub velocity_max_per_minute: u32,

    /// Blocked merchant category codes.
    pub blocked_mccs: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            transaction_limit_default: Decimal::new(100_000, 2), // 1000.00
            daily_limit_default: Decimal::new(500_000, 2),       // 5000.00
            velocity_max_per_minute: 5,
            blocked_mccs: vec![
                "6211".to_string(), // securities brokers
                "7995".to_string(), // gambling
                "5993".to_string(), // cigar stores
                "5912".to_string(), // drug stores
                "9754".to_string(), // quasi-cash
            ],
        }
    }
}
