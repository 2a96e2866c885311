//! In-memory CBS test double
//!
//! Simulates a bank core without external dependencies. Not a real
//! integration: production deployments bind a real adapter.

use crate::error::{BankError, Result};
use crate::BankAccountAdapter;
use async_trait::async_trait;
use card_core::money::{Currency, Money};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Hold {
    account_ref: String,
    amount: Decimal,
}

#[derive(Default)]
struct State {
    // account_ref -> total balance
    balances: HashMap<String, Decimal>,
    // reference_id -> hold
    holds: HashMap<String, Hold>,
    // reference_ids already committed, so repeats stay no-ops
    committed: HashSet<String>,
}

pub struct MockBankAdapter {
    state: RwLock<State>,
    currency: Currency,
    healthy: AtomicBool,
}

impl MockBankAdapter {
    pub fn new() -> Self {
        Self::with_currency(Currency::USD)
    }

    pub fn with_currency(currency: Currency) -> Self {
        Self {
            state: RwLock::new(State::default()),
            currency,
            healthy: AtomicBool::new(true),
        }
    }

    /// Seed an account with an initial balance.
    pub async fn create_account(&self, account_ref: &str, initial_balance: Decimal) {
        let mut state = self.state.write().await;
        state.balances.insert(account_ref.to_string(), initial_balance);
        debug!("Mock account created: {} with balance {}", account_ref, initial_balance);
    }

    pub async fn deposit(&self, account_ref: &str, amount: Decimal) {
        let mut state = self.state.write().await;
        *state.balances.entry(account_ref.to_string()).or_default() += amount;
    }

    /// Total balance including held funds.
    pub async fn total_balance(&self, account_ref: &str) -> Option<Decimal> {
        self.state.read().await.balances.get(account_ref).copied()
    }

    pub async fn active_hold_references(&self) -> Vec<String> {
        self.state.read().await.holds.keys().cloned().collect()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn available(state: &State, account_ref: &str) -> Option<Decimal> {
        let balance = state.balances.get(account_ref)?;
        let held: Decimal = state
            .holds
            .values()
            .filter(|hold| hold.account_ref == account_ref)
            .map(|hold| hold.amount)
            .sum();
        Some(balance - held)
    }
}

impl Default for MockBankAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BankAccountAdapter for MockBankAdapter {
    async fn available_balance(&self, account_ref: &str) -> Result<Money> {
        let state = self.state.read().await;
        let available = Self::available(&state, account_ref).ok_or_else(|| {
            BankError::core(account_ref, "getAvailableBalance", "Account not found in mock bank")
        })?;
        Ok(Money::new(available, self.currency))
    }

    async fn place_hold(&self, account_ref: &str, amount: Money, reference_id: &str) -> Result<()> {
        info!(
            "Mock: placing hold on {} amount {} ref {}",
            account_ref, amount, reference_id
        );

        let mut state = self.state.write().await;

        if state.holds.contains_key(reference_id) {
            debug!("Hold already exists: {}", reference_id);
            return Ok(());
        }

        let available = Self::available(&state, account_ref).ok_or_else(|| {
            BankError::core(account_ref, "placeHold", "Account not found in mock bank")
        })?;

        if available < amount.amount() {
            return Err(BankError::InsufficientFunds {
                account_ref: account_ref.to_string(),
                required: amount,
                available: Money::new(available, self.currency),
            });
        }

        state.holds.insert(
            reference_id.to_string(),
            Hold {
                account_ref: account_ref.to_string(),
                amount: amount.amount(),
            },
        );

        Ok(())
    }

    async fn commit_debit(&self, account_ref: &str, amount: Money, reference_id: &str) -> Result<()> {
        info!(
            "Mock: committing debit on {} amount {} ref {}",
            account_ref, amount, reference_id
        );

        let mut state = self.state.write().await;

        if state.committed.contains(reference_id) {
            debug!("Debit already committed: {}", reference_id);
            return Ok(());
        }

        let hold = state.holds.get(reference_id).cloned().ok_or_else(|| {
            BankError::core(
                account_ref,
                "commitDebit",
                format!("No hold found for reference: {}", reference_id),
            )
        })?;

        if amount.amount() > hold.amount {
            return Err(BankError::core(
                account_ref,
                "commitDebit",
                "Cannot commit more than held amount",
            ));
        }

        state.holds.remove(reference_id);
        state.committed.insert(reference_id.to_string());
        if let Some(balance) = state.balances.get_mut(account_ref) {
            *balance -= amount.amount();
        }

        Ok(())
    }

    async fn release_hold(&self, account_ref: &str, _amount: Money, reference_id: &str) -> Result<()> {
        info!("Mock: releasing hold on {} ref {}", account_ref, reference_id);

        // Idempotent, safe without a hold
        self.state.write().await.holds.remove(reference_id);
        Ok(())
    }

    fn adapter_name(&self) -> &'static str {
        "MockBank"
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_hold_reduces_available_balance() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(1000.00)).await;

        bank.place_hold("ACC1", Money::new(dec!(50.00), Currency::USD), "ref-1")
            .await
            .unwrap();

        let available = bank.available_balance("ACC1").await.unwrap();
        assert_eq!(available.amount(), dec!(950.00));
        // No debit observable yet
        assert_eq!(bank.total_balance("ACC1").await.unwrap(), dec!(1000.00));
    }

    #[tokio::test]
    async fn test_place_hold_is_idempotent() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(100.00)).await;

        let amount = Money::new(dec!(60.00), Currency::USD);
        bank.place_hold("ACC1", amount, "ref-1").await.unwrap();
        bank.place_hold("ACC1", amount, "ref-1").await.unwrap();

        // One hold, not two: 100 - 60, not 100 - 120
        assert_eq!(
            bank.available_balance("ACC1").await.unwrap().amount(),
            dec!(40.00)
        );
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(100.00)).await;

        let err = bank
            .place_hold("ACC1", Money::new(dec!(200.00), Currency::USD), "ref-1")
            .await
            .unwrap_err();

        assert!(matches!(err, BankError::InsufficientFunds { .. }));
        assert_eq!(
            bank.available_balance("ACC1").await.unwrap().amount(),
            dec!(100.00)
        );
    }

    #[tokio::test]
    async fn test_partial_commit_debits_exactly_the_cleared_amount() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(1000.00)).await;

        bank.place_hold("ACC1", Money::new(dec!(100.00), Currency::USD), "ref-1")
            .await
            .unwrap();
        bank.commit_debit("ACC1", Money::new(dec!(75.00), Currency::USD), "ref-1")
            .await
            .unwrap();

        assert_eq!(bank.total_balance("ACC1").await.unwrap(), dec!(925.00));
        assert_eq!(
            bank.available_balance("ACC1").await.unwrap().amount(),
            dec!(925.00)
        );
    }

    #[tokio::test]
    async fn test_commit_above_hold_is_rejected() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(1000.00)).await;

        bank.place_hold("ACC1", Money::new(dec!(100.00), Currency::USD), "ref-1")
            .await
            .unwrap();
        let err = bank
            .commit_debit("ACC1", Money::new(dec!(100.01), Currency::USD), "ref-1")
            .await
            .unwrap_err();

        assert!(matches!(err, BankError::Core { op: "commitDebit", .. }));
        assert_eq!(bank.total_balance("ACC1").await.unwrap(), dec!(1000.00));
    }

    #[tokio::test]
    async fn test_repeated_commit_is_a_no_op() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(1000.00)).await;

        let amount = Money::new(dec!(100.00), Currency::USD);
        bank.place_hold("ACC1", amount, "ref-1").await.unwrap();
        bank.commit_debit("ACC1", amount, "ref-1").await.unwrap();
        bank.commit_debit("ACC1", amount, "ref-1").await.unwrap();

        // Debited exactly once
        assert_eq!(bank.total_balance("ACC1").await.unwrap(), dec!(900.00));
    }

    #[tokio::test]
    async fn test_commit_without_hold_is_a_structured_error() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(1000.00)).await;

        let err = bank
            .commit_debit("ACC1", Money::new(dec!(10.00), Currency::USD), "no-such-ref")
            .await
            .unwrap_err();

        assert!(matches!(err, BankError::Core { .. }));
        // No silent debit
        assert_eq!(bank.total_balance("ACC1").await.unwrap(), dec!(1000.00));
    }

    #[tokio::test]
    async fn test_release_restores_available_and_is_idempotent() {
        let bank = MockBankAdapter::new();
        bank.create_account("ACC1", dec!(500.00)).await;

        let amount = Money::new(dec!(120.00), Currency::USD);
        bank.place_hold("ACC1", amount, "ref-1").await.unwrap();
        bank.release_hold("ACC1", amount, "ref-1").await.unwrap();
        bank.release_hold("ACC1", amount, "ref-1").await.unwrap();
        bank.release_hold("ACC1", amount, "never-held").await.unwrap();

        assert_eq!(
            bank.available_balance("ACC1").await.unwrap().amount(),
            dec!(500.00)
        );
        assert_eq!(bank.total_balance("ACC1").await.unwrap(), dec!(500.00));
    }
}
