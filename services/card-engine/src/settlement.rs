//! Settlement pipeline
//!
//! Clear, release and reverse against prior authorizations. Each
//! operation is gated by an idempotency key with the same decision-cache
//! discipline as authorization: a ledger entry under the key means the
//! work already happened and the call is a no-op. The authorization row is
//! re-read under a row lock so concurrent settlement operations for the
//! same authorization serialize.
//!
//! Propagation policy: clearing raises on any adapter failure; release is
//! best-effort against the CBS and always advances local state.

use crate::errors::{CardEngineError, Result};
use bank_adapters::BankAccountAdapter;
use card_core::authorization::{Authorization, AuthorizationStatus};
use card_core::idempotency;
use card_core::ledger::LedgerEntry;
use card_core::money::Money;
use card_core::store::{StoreTx, TransactionStore};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ClearingRequest {
    pub authorization_id: String,
    pub clearing_amount: Money,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct ReversalRequest {
    pub authorization_id: String,
    pub reversal_amount: Money,
    pub idempotency_key: String,
}

pub struct SettlementService {
    store: Arc<dyn TransactionStore>,
    bank: Arc<dyn BankAccountAdapter>,
}

impl SettlementService {
    pub fn new(store: Arc<dyn TransactionStore>, bank: Arc<dyn BankAccountAdapter>) -> Self {
        Self { store, bank }
    }

    /// Finalize a prior authorization by committing the debit in the CBS.
    /// Partial clearing is permitted up to the authorized amount.
    pub async fn clear(&self, request: ClearingRequest) -> Result<()> {
        idempotency::validate(&request.idempotency_key)?;

        let mut tx = self.store.begin().await?;
        if self.already_processed(&mut tx, &request.idempotency_key).await? {
            info!("Duplicate clearing request: {}", request.authorization_id);
            return Ok(());
        }

        info!(
            "Processing clearing: authId={}, amount={}",
            request.authorization_id, request.clearing_amount
        );

        let mut authorization = self
            .locked_authorization(&mut tx, &request.authorization_id)
            .await?;

        if authorization.status != AuthorizationStatus::Approved {
            return Err(CardEngineError::InvalidState(format!(
                "Cannot clear authorization in state: {}",
                authorization.status
            )));
        }
        if request
            .clearing_amount
            .is_greater_than(&authorization.amount)?
        {
            return Err(CardEngineError::Validation(
                "Clearing amount cannot exceed authorization amount".to_string(),
            ));
        }

        // The CBS movement happens inside the unit of work; a failure
        // aborts before any local state advances.
        if let Err(bank_err) = self
            .bank
            .commit_debit(
                &authorization.account_ref,
                request.clearing_amount,
                &request.authorization_id,
            )
            .await
        {
            error!(
                "Bank core rejected clearing: authId={}, error={}",
                request.authorization_id, bank_err
            );
            return Err(CardEngineError::SettlementFailed(bank_err.to_string()));
        }

        tx.append_ledger(&LedgerEntry::clearing(
            &authorization.account_ref,
            &authorization.card_id,
            request.clearing_amount,
            &request.authorization_id,
            &request.idempotency_key,
        ))
        .await?;

        authorization.clear(request.clearing_amount)?;
        tx.update_authorization(&authorization).await?;
        tx.commit().await?;

        info!(
            "Cleared authorization {} for {}",
            request.authorization_id, request.clearing_amount
        );
        Ok(())
    }

    /// Cancel the hold without debiting. Idempotent: repeats and calls on
    /// a non-approved authorization are no-ops. Adapter failures do not
    /// prevent the local transition; the hold is either gone already or
    /// left for reconciliation.
    pub async fn release(&self, authorization_id: &str, idempotency_key: &str) -> Result<()> {
        idempotency::validate(idempotency_key)?;

        let mut tx = self.store.begin().await?;
        if self.already_processed(&mut tx, idempotency_key).await? {
            info!("Duplicate release request: {}", authorization_id);
            return Ok(());
        }

        info!("Releasing authorization: {}", authorization_id);

        let mut authorization = self.locked_authorization(&mut tx, authorization_id).await?;

        if authorization.status != AuthorizationStatus::Approved {
            warn!(
                "Authorization not in approved state: {}, status={}",
                authorization_id, authorization.status
            );
            return Ok(());
        }

        if let Err(bank_err) = self
            .bank
            .release_hold(
                &authorization.account_ref,
                authorization.amount,
                authorization_id,
            )
            .await
        {
            error!(
                "Error releasing hold in bank core, continuing locally: authId={}, error={}",
                authorization_id, bank_err
            );
        }

        tx.append_ledger(&LedgerEntry::auth_release(
            &authorization.account_ref,
            &authorization.card_id,
            authorization.amount,
            authorization_id,
            idempotency_key,
        ))
        .await?;

        authorization.release()?;
        tx.update_authorization(&authorization).await?;
        tx.commit().await?;

        info!("Released authorization {}", authorization_id);
        Ok(())
    }

    /// Refund a cleared transaction. The actual credit runs through the
    /// CBS's own refund mechanism; the core records the reversal and moves
    /// the authorization to its terminal state.
    pub async fn reverse(&self, request: ReversalRequest) -> Result<()> {
        idempotency::validate(&request.idempotency_key)?;

        let mut tx = self.store.begin().await?;
        if self.already_processed(&mut tx, &request.idempotency_key).await? {
            info!("Duplicate reversal request: {}", request.authorization_id);
            return Ok(());
        }

        info!(
            "Processing reversal: authId={}, amount={}",
            request.authorization_id, request.reversal_amount
        );

        let mut authorization = self
            .locked_authorization(&mut tx, &request.authorization_id)
            .await?;

        if authorization.status != AuthorizationStatus::Cleared {
            return Err(CardEngineError::InvalidState(format!(
                "Cannot reverse authorization in state: {}",
                authorization.status
            )));
        }
        let cleared = authorization.cleared_amount.ok_or_else(|| {
            CardEngineError::InvalidState(format!(
                "Cleared authorization {} has no cleared amount",
                request.authorization_id
            ))
        })?;
        if request.reversal_amount.is_greater_than(&cleared)? {
            return Err(CardEngineError::Validation(
                "Reversal amount cannot exceed cleared amount".to_string(),
            ));
        }

        warn!(
            "Reversal delegated to bank core refund mechanism: authId={}",
            request.authorization_id
        );

        tx.append_ledger(&LedgerEntry::reversal(
            &authorization.account_ref,
            &authorization.card_id,
            request.reversal_amount,
            &request.authorization_id,
            &request.idempotency_key,
        ))
        .await?;

        authorization.reverse(request.reversal_amount)?;
        tx.update_authorization(&authorization).await?;
        tx.commit().await?;

        info!("Reversed authorization {}", request.authorization_id);
        Ok(())
    }

    async fn already_processed(
        &self,
        tx: &mut Box<dyn StoreTx>,
        idempotency_key: &str,
    ) -> Result<bool> {
        Ok(tx
            .find_ledger_by_idempotency_key(idempotency_key)
            .await?
            .is_some())
    }

    async fn locked_authorization(
        &self,
        tx: &mut Box<dyn StoreTx>,
        authorization_id: &str,
    ) -> Result<Authorization> {
        tx.find_for_update(authorization_id).await?.ok_or_else(|| {
            CardEngineError::NotFound(format!("Authorization not found: {}", authorization_id))
        })
    }
}
