//! End-to-end pipeline tests on the in-memory stores and the mock bank
//! adapter: authorization decisions, decision-cache behavior, the
//! hold/clear/release/reverse lifecycle, and the processor webhook flows.

use bank_adapters::{BankAccountAdapter, MockBankAdapter};
use card_core::authorization::{AuthorizationRequest, AuthorizationStatus, Merchant};
use card_core::card::Card;
use card_core::ledger::{LedgerEntry, TransactionType};
use card_core::money::{Currency, Money};
use card_core::store::TransactionStore;
use card_engine::errors::CardEngineError;
use card_engine::processor::webhooks::{
    AuthorizationWebhook, ClearingWebhook, MerchantInfo, ReversalWebhook,
};
use card_engine::processor::ProcessorAdapter;
use card_engine::stores::MemoryStore;
use card_engine::{AuthorizationService, ClearingRequest, IssuanceService, ReversalRequest, SettlementService};
use chrono::NaiveDate;
use rules_engine::{RulesConfig, RulesEngine};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryStore>,
    bank: Arc<MockBankAdapter>,
    authorizations: Arc<AuthorizationService>,
    settlements: Arc<SettlementService>,
    issuance: Arc<IssuanceService>,
}

impl Harness {
    fn new() -> Self {
        Self::with_rules(RulesConfig {
            transaction_limit_default: dec!(1000.00),
            daily_limit_default: dec!(5000.00),
            velocity_max_per_minute: 5,
            blocked_mccs: vec!["7995".to_string(), "6211".to_string()],
        })
    }

    fn with_rules(rules_config: RulesConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let bank = Arc::new(MockBankAdapter::new());

        let rules = RulesEngine::standard(store.clone(), &rules_config);
        let authorizations = Arc::new(AuthorizationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            bank.clone(),
            rules,
        ));
        let settlements = Arc::new(SettlementService::new(store.clone(), bank.clone()));
        let issuance = Arc::new(IssuanceService::new(
            store.clone(),
            store.clone(),
            bank.clone(),
        ));

        Self {
            store,
            bank,
            authorizations,
            settlements,
            issuance,
        }
    }

    fn processor(&self) -> ProcessorAdapter {
        ProcessorAdapter::new(
            self.authorizations.clone(),
            self.settlements.clone(),
            self.store.clone(),
            self.store.clone(),
        )
    }

    /// Account with the given balance plus an ACTIVE card mapped to it.
    async fn active_card(&self, account_ref: &str, balance: Decimal) -> Card {
        self.bank.create_account(account_ref, balance).await;
        let card = self
            .issuance
            .issue_card(
                "CLIENT-1",
                account_ref,
                "Jane Holder",
                NaiveDate::from_ymd_opt(2030, 6, 30).unwrap(),
                "tests",
            )
            .await
            .unwrap();
        self.issuance.activate(&card.card_id).await.unwrap()
    }

    async fn available(&self, account_ref: &str) -> Decimal {
        self.bank
            .available_balance(account_ref)
            .await
            .unwrap()
            .amount()
    }

    async fn ledger_of(&self, transaction_type: TransactionType) -> Vec<LedgerEntry> {
        self.store
            .ledger_entries()
            .await
            .into_iter()
            .filter(|entry| entry.transaction_type == transaction_type)
            .collect()
    }
}

fn request(card_id: &str, amount: Decimal, mcc: &str, key: &str) -> AuthorizationRequest {
    AuthorizationRequest {
        authorization_id: format!("auth-{}", key),
        card_id: card_id.to_string(),
        amount: Money::new(amount, Currency::USD),
        merchant: Merchant {
            name: "Coffee Corner".to_string(),
            category_code: Some(mcc.to_string()),
            city: Some("Lisbon".to_string()),
            country: Some("PT".to_string()),
        },
        idempotency_key: key.to_string(),
    }
}

// =========================================================================
// AUTHORIZATION
// =========================================================================

#[tokio::test]
async fn test_happy_path_authorize_then_clear() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Approved);
    assert_eq!(h.available("ACC1").await, dec!(950.00));
    assert_eq!(h.bank.total_balance("ACC1").await.unwrap(), dec!(1000.00));
    assert_eq!(h.ledger_of(TransactionType::AuthHold).await.len(), 1);

    h.settlements
        .clear(ClearingRequest {
            authorization_id: response.authorization_id.clone(),
            clearing_amount: Money::new(dec!(50.00), Currency::USD),
            idempotency_key: "k2".to_string(),
        })
        .await
        .unwrap();

    let auth = h
        .store
        .find_authorization(&response.authorization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Cleared);
    assert_eq!(h.bank.total_balance("ACC1").await.unwrap(), dec!(950.00));
    assert_eq!(h.ledger_of(TransactionType::ClearingCommit).await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_idempotency_key_returns_cached_decision() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let first = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap();
    let second = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(first.authorization_id, second.authorization_id);
    assert_eq!(first.status, second.status);
    // One hold, not two
    assert_eq!(h.available("ACC1").await, dec!(950.00));
    assert_eq!(h.bank.active_hold_references().await.len(), 1);
}

#[tokio::test]
async fn test_insufficient_funds_declines_without_a_hold() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(100.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(200.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Declined);
    assert_eq!(response.decline_reason.as_deref(), Some("Insufficient funds"));
    assert!(h.bank.active_hold_references().await.is_empty());
    assert_eq!(h.available("ACC1").await, dec!(100.00));

    // The decision is durable
    let auth = h
        .store
        .find_authorization(&format!("auth-{}", "k1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Declined);
}

#[tokio::test]
async fn test_blocked_mcc_declines_before_any_bank_call() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "7995", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Declined);
    assert!(response.decline_reason.unwrap().contains("blocked"));
    // No hold placed, balance untouched
    assert!(h.bank.active_hold_references().await.is_empty());
    assert_eq!(h.available("ACC1").await, dec!(1000.00));
}

#[tokio::test]
async fn test_transaction_limit_boundary() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(2000.00)).await;

    let at_limit = h
        .authorizations
        .authorize(request(&card.card_id, dec!(1000.00), "5814", "k1"))
        .await
        .unwrap();
    assert_eq!(at_limit.status, AuthorizationStatus::Approved);

    let over = h
        .authorizations
        .authorize(request(&card.card_id, dec!(1000.01), "5814", "k2"))
        .await
        .unwrap();
    assert_eq!(over.status, AuthorizationStatus::Declined);
    assert!(over.decline_reason.unwrap().contains("exceeds limit"));
}

#[tokio::test]
async fn test_velocity_declines_at_threshold() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    for i in 0..5 {
        let response = h
            .authorizations
            .authorize(request(&card.card_id, dec!(10.00), "5814", &format!("k{}", i)))
            .await
            .unwrap();
        assert_eq!(response.status, AuthorizationStatus::Approved);
    }

    let sixth = h
        .authorizations
        .authorize(request(&card.card_id, dec!(10.00), "5814", "k6"))
        .await
        .unwrap();
    assert_eq!(sixth.status, AuthorizationStatus::Declined);
    assert!(sixth.decline_reason.unwrap().contains("Velocity limit"));
}

#[tokio::test]
async fn test_daily_limit_caps_approved_spend() {
    let h = Harness::with_rules(RulesConfig {
        transaction_limit_default: dec!(1000.00),
        daily_limit_default: dec!(5000.00),
        velocity_max_per_minute: 100,
        blocked_mccs: vec![],
    });
    let card = h.active_card("ACC1", dec!(10000.00)).await;

    for i in 0..5 {
        let response = h
            .authorizations
            .authorize(request(&card.card_id, dec!(1000.00), "5814", &format!("k{}", i)))
            .await
            .unwrap();
        assert_eq!(response.status, AuthorizationStatus::Approved, "authorization {}", i);
    }

    // 5000.00 spent; any further amount goes over
    let over = h
        .authorizations
        .authorize(request(&card.card_id, dec!(0.01), "5814", "k-over"))
        .await
        .unwrap();
    assert_eq!(over.status, AuthorizationStatus::Declined);
    assert!(over.decline_reason.unwrap().contains("Daily spend limit"));
}

#[tokio::test]
async fn test_unknown_card_declines() {
    let h = Harness::new();

    let response = h
        .authorizations
        .authorize(request("no-such-card", dec!(50.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Declined);
    assert_eq!(response.decline_reason.as_deref(), Some("Card not found"));
}

#[tokio::test]
async fn test_frozen_card_declines() {
    let h = Harness::new();
    h.bank.create_account("ACC1", dec!(1000.00)).await;
    // Issued but never activated
    let card = h
        .issuance
        .issue_card(
            "CLIENT-1",
            "ACC1",
            "Jane Holder",
            NaiveDate::from_ymd_opt(2030, 6, 30).unwrap(),
            "tests",
        )
        .await
        .unwrap();

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Declined);
    assert_eq!(
        response.decline_reason.as_deref(),
        Some("Card is not active: FROZEN")
    );
}

#[tokio::test]
async fn test_expired_card_declines() {
    let h = Harness::new();
    h.bank.create_account("ACC1", dec!(1000.00)).await;
    let card = h
        .issuance
        .issue_card(
            "CLIENT-1",
            "ACC1",
            "Jane Holder",
            NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
            "tests",
        )
        .await
        .unwrap();
    h.issuance.activate(&card.card_id).await.unwrap();

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Declined);
    assert_eq!(response.decline_reason.as_deref(), Some("Card is expired"));
}

#[tokio::test]
async fn test_unmapped_card_declines() {
    let h = Harness::new();
    let mut card = Card::issue(
        "Jane Holder",
        "4242",
        NaiveDate::from_ymd_opt(2030, 6, 30).unwrap(),
        "CLIENT-1",
    );
    card.activate().unwrap();
    card_core::store::CardStore::insert(h.store.as_ref(), &card)
        .await
        .unwrap();

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Declined);
    assert_eq!(
        response.decline_reason.as_deref(),
        Some("No bank account linked to card")
    );
}

#[tokio::test]
async fn test_bank_fault_is_a_persisted_decline() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    // Simulate the CBS losing the account between issuance and
    // authorization: a fresh mock without ACC1 fails the hold with a core
    // error, not insufficient funds.
    let fresh_bank = Arc::new(MockBankAdapter::new());
    let rules = RulesEngine::standard(
        h.store.clone() as Arc<dyn TransactionStore>,
        &RulesConfig::default(),
    );
    let authorizations = AuthorizationService::new(
        h.store.clone(),
        h.store.clone(),
        h.store.clone(),
        fresh_bank,
        rules,
    );

    let response = authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap();

    assert_eq!(response.status, AuthorizationStatus::Declined);
    assert!(response
        .decline_reason
        .as_deref()
        .unwrap()
        .starts_with("Bank declined:"));

    let auth = h
        .store
        .find_authorization(&format!("auth-{}", "k1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Declined);
}

#[tokio::test]
async fn test_local_failure_after_hold_releases_the_hold() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    // Poison the ledger idempotency key so the approval cannot commit.
    let mut tx = h.store.begin().await.unwrap();
    tx.append_ledger(&LedgerEntry::auth_hold(
        "ACC1",
        "other-card",
        Money::new(dec!(1.00), Currency::USD),
        "other-auth",
        "k1",
    ))
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let err = h
        .authorizations
        .authorize(request(&card.card_id, dec!(50.00), "5814", "k1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CardEngineError::Conflict(_)));
    // The hold was compensated, nothing leaked
    assert!(h.bank.active_hold_references().await.is_empty());
    assert_eq!(h.available("ACC1").await, dec!(1000.00));
    assert!(h
        .store
        .find_authorization(&format!("auth-{}", "k1"))
        .await
        .unwrap()
        .is_none());
}

// =========================================================================
// SETTLEMENT
// =========================================================================

#[tokio::test]
async fn test_partial_clearing() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();

    h.settlements
        .clear(ClearingRequest {
            authorization_id: response.authorization_id.clone(),
            clearing_amount: Money::new(dec!(75.00), Currency::USD),
            idempotency_key: "k2".to_string(),
        })
        .await
        .unwrap();

    let auth = h
        .store
        .find_authorization(&response.authorization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Cleared);
    assert_eq!(auth.cleared_amount.unwrap().amount(), dec!(75.00));
    assert_eq!(h.bank.total_balance("ACC1").await.unwrap(), dec!(925.00));
}

#[tokio::test]
async fn test_clear_is_idempotent_on_key() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();

    let clearing = ClearingRequest {
        authorization_id: response.authorization_id.clone(),
        clearing_amount: Money::new(dec!(100.00), Currency::USD),
        idempotency_key: "k2".to_string(),
    };
    h.settlements.clear(clearing.clone()).await.unwrap();
    h.settlements.clear(clearing).await.unwrap();

    // Debited once
    assert_eq!(h.bank.total_balance("ACC1").await.unwrap(), dec!(900.00));
    assert_eq!(h.ledger_of(TransactionType::ClearingCommit).await.len(), 1);
}

#[tokio::test]
async fn test_clear_rejects_amount_above_authorization() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();

    let err = h
        .settlements
        .clear(ClearingRequest {
            authorization_id: response.authorization_id.clone(),
            clearing_amount: Money::new(dec!(100.01), Currency::USD),
            idempotency_key: "k2".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CardEngineError::Validation(_)));
    // Still approved, hold intact
    let auth = h
        .store
        .find_authorization(&response.authorization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Approved);
    assert_eq!(h.bank.active_hold_references().await.len(), 1);
}

#[tokio::test]
async fn test_clear_requires_approved_state() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();

    h.settlements
        .release(&response.authorization_id, "k2")
        .await
        .unwrap();

    let err = h
        .settlements
        .clear(ClearingRequest {
            authorization_id: response.authorization_id,
            clearing_amount: Money::new(dec!(100.00), Currency::USD),
            idempotency_key: "k3".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CardEngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_release_returns_funds_without_debit() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();
    assert_eq!(h.available("ACC1").await, dec!(900.00));

    h.settlements
        .release(&response.authorization_id, "k2")
        .await
        .unwrap();

    let auth = h
        .store
        .find_authorization(&response.authorization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Released);
    assert_eq!(h.available("ACC1").await, dec!(1000.00));
    assert_eq!(h.bank.total_balance("ACC1").await.unwrap(), dec!(1000.00));
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();

    h.settlements
        .release(&response.authorization_id, "k2")
        .await
        .unwrap();
    // Same key: decision cache. New key on a RELEASED authorization: no-op.
    h.settlements
        .release(&response.authorization_id, "k2")
        .await
        .unwrap();
    h.settlements
        .release(&response.authorization_id, "k3")
        .await
        .unwrap();

    assert_eq!(h.ledger_of(TransactionType::AuthRelease).await.len(), 1);
}

#[tokio::test]
async fn test_reverse_after_clear() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();
    h.settlements
        .clear(ClearingRequest {
            authorization_id: response.authorization_id.clone(),
            clearing_amount: Money::new(dec!(100.00), Currency::USD),
            idempotency_key: "k2".to_string(),
        })
        .await
        .unwrap();

    h.settlements
        .reverse(ReversalRequest {
            authorization_id: response.authorization_id.clone(),
            reversal_amount: Money::new(dec!(100.00), Currency::USD),
            idempotency_key: "k3".to_string(),
        })
        .await
        .unwrap();

    let auth = h
        .store
        .find_authorization(&response.authorization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Reversed);
    assert_eq!(h.ledger_of(TransactionType::Reversal).await.len(), 1);
}

#[tokio::test]
async fn test_reverse_requires_cleared_and_caps_at_cleared_amount() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;

    let response = h
        .authorizations
        .authorize(request(&card.card_id, dec!(100.00), "5814", "k1"))
        .await
        .unwrap();

    // Not cleared yet
    let err = h
        .settlements
        .reverse(ReversalRequest {
            authorization_id: response.authorization_id.clone(),
            reversal_amount: Money::new(dec!(50.00), Currency::USD),
            idempotency_key: "k2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CardEngineError::InvalidState(_)));

    h.settlements
        .clear(ClearingRequest {
            authorization_id: response.authorization_id.clone(),
            clearing_amount: Money::new(dec!(60.00), Currency::USD),
            idempotency_key: "k3".to_string(),
        })
        .await
        .unwrap();

    // Above the cleared amount
    let err = h
        .settlements
        .reverse(ReversalRequest {
            authorization_id: response.authorization_id.clone(),
            reversal_amount: Money::new(dec!(60.01), Currency::USD),
            idempotency_key: "k4".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CardEngineError::Validation(_)));

    // Partial reversal still lands on the terminal status
    h.settlements
        .reverse(ReversalRequest {
            authorization_id: response.authorization_id.clone(),
            reversal_amount: Money::new(dec!(30.00), Currency::USD),
            idempotency_key: "k5".to_string(),
        })
        .await
        .unwrap();

    let auth = h
        .store
        .find_authorization(&response.authorization_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Reversed);
}

#[tokio::test]
async fn test_settlement_on_unknown_authorization_is_not_found() {
    let h = Harness::new();

    let err = h
        .settlements
        .clear(ClearingRequest {
            authorization_id: "no-such-auth".to_string(),
            clearing_amount: Money::new(dec!(10.00), Currency::USD),
            idempotency_key: "k1".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CardEngineError::NotFound(_)));
}

// =========================================================================
// PROCESSOR WEBHOOKS
// =========================================================================

fn authorization_webhook(card_token: &str, txn_id: &str, key: &str) -> AuthorizationWebhook {
    AuthorizationWebhook {
        processor_transaction_id: txn_id.to_string(),
        card_token: card_token.to_string(),
        amount: dec!(50.00),
        currency: "USD".to_string(),
        merchant: MerchantInfo {
            name: "Coffee Corner".to_string(),
            category_code: Some("5814".to_string()),
            city: Some("Lisbon".to_string()),
            country: Some("PT".to_string()),
        },
        timestamp: None,
        idempotency_key: key.to_string(),
    }
}

#[tokio::test]
async fn test_processor_authorize_clear_reverse_flow() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;
    let adapter = h.processor();

    let response = adapter
        .handle_authorization(authorization_webhook(&card.last4, "ptx-1", "pk1"))
        .await;
    assert_eq!(response.status, "APPROVED");
    let internal_id = response.authorization_code.unwrap();

    adapter
        .handle_clearing(ClearingWebhook {
            processor_transaction_id: "ptx-1".to_string(),
            settled_amount: dec!(50.00),
            currency: "USD".to_string(),
            settlement_date: None,
            idempotency_key: "pk2".to_string(),
        })
        .await
        .unwrap();

    adapter
        .handle_reversal(ReversalWebhook {
            processor_transaction_id: "ptx-1".to_string(),
            reversal_amount: dec!(50.00),
            currency: "USD".to_string(),
            reason: Some("customer refund".to_string()),
            timestamp: None,
            idempotency_key: "pk3".to_string(),
        })
        .await
        .unwrap();

    let auth = h.store.find_authorization(&internal_id).await.unwrap().unwrap();
    assert_eq!(auth.status, AuthorizationStatus::Reversed);
}

#[tokio::test]
async fn test_processor_unknown_token_is_a_synthetic_decline() {
    let h = Harness::new();
    let adapter = h.processor();

    let response = adapter
        .handle_authorization(authorization_webhook("0000", "ptx-1", "pk1"))
        .await;

    assert_eq!(response.status, "DECLINED");
    assert_eq!(
        response.decline_reason.as_deref(),
        Some("Card not found for token")
    );
}

#[tokio::test]
async fn test_processor_decline_creates_no_mapping() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;
    let adapter = h.processor();

    let mut webhook = authorization_webhook(&card.last4, "ptx-1", "pk1");
    webhook.merchant.category_code = Some("7995".to_string());
    let response = adapter.handle_authorization(webhook).await;
    assert_eq!(response.status, "DECLINED");

    // Clearing the declined transaction finds no mapping
    let err = adapter
        .handle_clearing(ClearingWebhook {
            processor_transaction_id: "ptx-1".to_string(),
            settled_amount: dec!(50.00),
            currency: "USD".to_string(),
            settlement_date: None,
            idempotency_key: "pk2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CardEngineError::UnknownTransaction(_)));
}

#[tokio::test]
async fn test_processor_retry_hits_decision_cache() {
    let h = Harness::new();
    let card = h.active_card("ACC1", dec!(1000.00)).await;
    let adapter = h.processor();

    let first = adapter
        .handle_authorization(authorization_webhook(&card.last4, "ptx-1", "pk1"))
        .await;
    let second = adapter
        .handle_authorization(authorization_webhook(&card.last4, "ptx-1", "pk1"))
        .await;

    assert_eq!(first.status, "APPROVED");
    assert_eq!(second.status, "APPROVED");
    // One hold in the CBS despite the retry
    assert_eq!(h.bank.active_hold_references().await.len(), 1);
}
