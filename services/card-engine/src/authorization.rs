//! Authorization pipeline
//!
//! Coordinates card validation, policy rules, the CBS hold and the
//! durable decision record. The CBS checks balance; the local store is
//! only the decision cache and audit trail. Every decline is persisted
//! with its reason before returning so processor retries always observe
//! the original decision.

use crate::errors::{CardEngineError, Result};
use bank_adapters::{BankAccountAdapter, BankError};
use card_core::authorization::{
    Authorization, AuthorizationRequest, AuthorizationResponse,
};
use card_core::idempotency;
use card_core::ledger::LedgerEntry;
use card_core::money::Money;
use card_core::store::{CardStore, MappingStore, StoreError, StoreTx, TransactionStore};
use chrono::Utc;
use rules_engine::{RuleResult, RulesEngine};
use std::sync::Arc;
use tracing::{error, info};

const UNKNOWN_ACCOUNT: &str = "UNKNOWN";

pub struct AuthorizationService {
    store: Arc<dyn TransactionStore>,
    cards: Arc<dyn CardStore>,
    mappings: Arc<dyn MappingStore>,
    bank: Arc<dyn BankAccountAdapter>,
    rules: RulesEngine,
}

impl AuthorizationService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        cards: Arc<dyn CardStore>,
        mappings: Arc<dyn MappingStore>,
        bank: Arc<dyn BankAccountAdapter>,
        rules: RulesEngine,
    ) -> Self {
        Self {
            store,
            cards,
            mappings,
            bank,
            rules,
        }
    }

    pub async fn authorize(&self, request: AuthorizationRequest) -> Result<AuthorizationResponse> {
        idempotency::validate(&request.idempotency_key)?;

        let mut tx = self.store.begin().await?;

        // Decision cache: a duplicate key returns the stored decision and
        // does no other work.
        if let Some(existing) = tx.find_by_idempotency_key(&request.idempotency_key).await? {
            info!("Duplicate authorization request: {}", request.authorization_id);
            return Ok(existing.to_response());
        }

        info!(
            "Processing authorization: authId={}, cardId={}, amount={}",
            request.authorization_id, request.card_id, request.amount
        );

        // Card resolution and state checks
        let card = match self.cards.find_by_card_id(&request.card_id).await? {
            Some(card) => card,
            None => {
                return self
                    .decline(tx, &request, UNKNOWN_ACCOUNT, "Card not found")
                    .await;
            }
        };

        // The mapping is looked up early so declines can carry the account
        // reference they were decided against.
        let mapping = self.mappings.find_by_card_id(&card.card_id).await?;
        let account_ref = mapping
            .as_ref()
            .map(|m| m.bank_account_ref.clone())
            .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string());

        if !card.is_active() {
            let reason = format!("Card is not active: {}", card.state);
            return self.decline(tx, &request, &account_ref, &reason).await;
        }
        if card.is_expired(Utc::now().date_naive()) {
            return self.decline(tx, &request, &account_ref, "Card is expired").await;
        }

        let Some(mapping) = mapping else {
            return self
                .decline(tx, &request, UNKNOWN_ACCOUNT, "No bank account linked to card")
                .await;
        };

        // Policy before the CBS: a rules decline never costs a bank call.
        match self.rules.evaluate(&request).await? {
            RuleResult::Approve => {}
            RuleResult::Decline(reason) => {
                return self
                    .decline(tx, &request, &mapping.bank_account_ref, &reason)
                    .await;
            }
        }

        // Reserve funds in the CBS. Insufficient funds and bank faults are
        // both persisted declines; the decision must be cached either way.
        match self
            .bank
            .place_hold(
                &mapping.bank_account_ref,
                request.amount,
                &request.authorization_id,
            )
            .await
        {
            Ok(()) => {}
            Err(BankError::InsufficientFunds { .. }) => {
                return self
                    .decline(tx, &request, &mapping.bank_account_ref, "Insufficient funds")
                    .await;
            }
            Err(BankError::Core { cause, .. }) => {
                error!(
                    "Bank core rejected hold: authId={}, cause={}",
                    request.authorization_id, cause
                );
                let reason = format!("Bank declined: {}", cause);
                return self
                    .decline(tx, &request, &mapping.bank_account_ref, &reason)
                    .await;
            }
        }

        // Persist the approval and the audit entry in the same unit of
        // work. A hold exists in the CBS from here on: any local failure
        // must compensate by releasing it.
        let authorization = Authorization::approved(&request, mapping.bank_account_ref.as_str());
        let entry = LedgerEntry::auth_hold(
            &mapping.bank_account_ref,
            &request.card_id,
            request.amount,
            &request.authorization_id,
            &request.idempotency_key,
        );

        let committed = async {
            tx.insert_authorization(&authorization).await?;
            tx.append_ledger(&entry).await?;
            tx.commit().await
        }
        .await;

        if let Err(store_err) = committed {
            self.release_orphaned_hold(&mapping.bank_account_ref, request.amount, &request.authorization_id)
                .await;

            // A concurrent request with the same key won the insert; its
            // decision is the one to return.
            if matches!(store_err, StoreError::Duplicate(_)) {
                if let Some(existing) = self.cached_decision(&request.idempotency_key).await? {
                    return Ok(existing);
                }
            }
            return Err(store_err.into());
        }

        info!("Authorization APPROVED: authId={}", request.authorization_id);
        Ok(AuthorizationResponse::approved(request.authorization_id))
    }

    pub async fn get_authorization(&self, authorization_id: &str) -> Result<Authorization> {
        self.store
            .find_authorization(authorization_id)
            .await?
            .ok_or_else(|| {
                CardEngineError::NotFound(format!(
                    "Authorization not found: {}",
                    authorization_id
                ))
            })
    }

    async fn decline(
        &self,
        mut tx: Box<dyn StoreTx>,
        request: &AuthorizationRequest,
        account_ref: &str,
        reason: &str,
    ) -> Result<AuthorizationResponse> {
        info!(
            "Authorization DECLINED: authId={}, reason={}",
            request.authorization_id, reason
        );

        let authorization = Authorization::declined(request, account_ref, reason);

        let committed = async {
            tx.insert_authorization(&authorization).await?;
            tx.commit().await
        }
        .await;

        if let Err(store_err) = committed {
            if matches!(store_err, StoreError::Duplicate(_)) {
                if let Some(existing) = self.cached_decision(&request.idempotency_key).await? {
                    return Ok(existing);
                }
            }
            return Err(store_err.into());
        }

        Ok(authorization.to_response())
    }

    async fn cached_decision(&self, key: &str) -> Result<Option<AuthorizationResponse>> {
        let mut tx = self.store.begin().await?;
        Ok(tx
            .find_by_idempotency_key(key)
            .await?
            .map(|existing| existing.to_response()))
    }

    /// Compensation for a hold whose approval never committed locally. A
    /// failed release leaves an orphaned CBS hold, so the reference is
    /// logged for reconciliation.
    async fn release_orphaned_hold(&self, account_ref: &str, amount: Money, reference_id: &str) {
        if let Err(release_err) = self.bank.release_hold(account_ref, amount, reference_id).await {
            error!(
                "Failed to release hold after local failure, reconciliation needed: \
                 account={}, ref={}, error={}",
                account_ref, reference_id, release_err
            );
        } else {
            info!("Compensating release completed: ref={}", reference_id);
        }
    }
}
