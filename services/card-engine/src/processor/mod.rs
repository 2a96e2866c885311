//! Inbound processor adapter
//!
//! Translates processor-native webhook events into internal requests and
//! correlates processor transaction ids with internal authorization ids.
//! Translation only: policy, balance and ledger decisions belong to the
//! pipelines this adapter forwards to.

pub mod webhooks;

use crate::authorization::AuthorizationService;
use crate::errors::{CardEngineError, Result};
use crate::settlement::{ClearingRequest, ReversalRequest, SettlementService};
use card_core::authorization::{AuthorizationRequest, AuthorizationStatus, Merchant};
use card_core::mapping::ProcessorTransactionMapping;
use card_core::money::{Currency, Money};
use card_core::store::{CardStore, ProcessorMappingStore, StoreError};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;
use webhooks::{AuthorizationWebhook, ClearingWebhook, ProcessorResponse, ReversalWebhook};

const PROCESSOR_NAME: &str = "SampleProcessor";

pub struct ProcessorAdapter {
    authorizations: Arc<AuthorizationService>,
    settlements: Arc<SettlementService>,
    cards: Arc<dyn CardStore>,
    mappings: Arc<dyn ProcessorMappingStore>,
}

impl ProcessorAdapter {
    pub fn new(
        authorizations: Arc<AuthorizationService>,
        settlements: Arc<SettlementService>,
        cards: Arc<dyn CardStore>,
        mappings: Arc<dyn ProcessorMappingStore>,
    ) -> Self {
        Self {
            authorizations,
            settlements,
            cards,
            mappings,
        }
    }

    pub fn processor_name(&self) -> &'static str {
        PROCESSOR_NAME
    }

    /// Authorization webhook. Known, unavoidable declines (unknown token,
    /// policy, funds) and internal faults all come back as a DECLINED
    /// processor response; the processor must never see a 5xx for an
    /// authorization decision.
    pub async fn handle_authorization(&self, webhook: AuthorizationWebhook) -> ProcessorResponse {
        info!(
            "Authorization webhook from {}: processorTxnId={}, amount={} {}",
            PROCESSOR_NAME, webhook.processor_transaction_id, webhook.amount, webhook.currency
        );

        match self.authorize(&webhook).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "Error processing authorization webhook: processorTxnId={}, error={}",
                    webhook.processor_transaction_id, e
                );
                ProcessorResponse::declined(format!("System error: {}", e))
            }
        }
    }

    async fn authorize(&self, webhook: &AuthorizationWebhook) -> Result<ProcessorResponse> {
        let currency = match Currency::from_str(&webhook.currency) {
            Ok(currency) => currency,
            Err(_) => {
                return Ok(ProcessorResponse::declined(format!(
                    "Currency not supported: {}",
                    webhook.currency
                )));
            }
        };

        // Token to card. A synthetic decline, not an error: the processor
        // retries errors, and an unknown card will stay unknown.
        let Some(card) = self.cards.find_by_last4(&webhook.card_token).await? else {
            info!(
                "Card not found for token: processorTxnId={}",
                webhook.processor_transaction_id
            );
            return Ok(ProcessorResponse::declined("Card not found for token"));
        };

        let internal_authorization_id = Uuid::new_v4().to_string();
        let request = AuthorizationRequest {
            authorization_id: internal_authorization_id.clone(),
            card_id: card.card_id.clone(),
            amount: Money::new(webhook.amount, currency),
            merchant: Merchant {
                name: webhook.merchant.name.clone(),
                category_code: webhook.merchant.category_code.clone(),
                city: webhook.merchant.city.clone(),
                country: webhook.merchant.country.clone(),
            },
            // The processor's key carries through so its retries hit the
            // decision cache.
            idempotency_key: webhook.idempotency_key.clone(),
        };

        let response = self.authorizations.authorize(request).await?;

        // Only approved authorizations are correlated; declines leave no
        // mapping behind.
        if response.status == AuthorizationStatus::Approved {
            self.store_mapping(
                &webhook.processor_transaction_id,
                &response.authorization_id,
                &webhook.card_token,
            )
            .await?;
            info!(
                "Authorization APPROVED: processorTxnId={}, internalAuthId={}",
                webhook.processor_transaction_id, response.authorization_id
            );
            Ok(ProcessorResponse::approved(response.authorization_id))
        } else {
            info!(
                "Authorization DECLINED: processorTxnId={}, reason={:?}",
                webhook.processor_transaction_id, response.decline_reason
            );
            Ok(ProcessorResponse::declined(
                response
                    .decline_reason
                    .unwrap_or_else(|| "Declined".to_string()),
            ))
        }
    }

    /// Clearing webhook. An unknown processor transaction is surfaced as
    /// an error (5xx) so the processor retries and an operator can
    /// reconcile.
    pub async fn handle_clearing(&self, webhook: ClearingWebhook) -> Result<()> {
        info!(
            "Clearing webhook from {}: processorTxnId={}, settledAmount={} {}",
            PROCESSOR_NAME, webhook.processor_transaction_id, webhook.settled_amount, webhook.currency
        );

        let mapping = self.lookup(&webhook.processor_transaction_id).await?;
        let currency = Currency::from_str(&webhook.currency)?;

        self.settlements
            .clear(ClearingRequest {
                authorization_id: mapping.internal_authorization_id.clone(),
                clearing_amount: Money::new(webhook.settled_amount, currency),
                idempotency_key: webhook.idempotency_key,
            })
            .await?;

        info!(
            "Clearing completed: processorTxnId={}, internalAuthId={}",
            webhook.processor_transaction_id, mapping.internal_authorization_id
        );
        Ok(())
    }

    pub async fn handle_reversal(&self, webhook: ReversalWebhook) -> Result<()> {
        info!(
            "Reversal webhook from {}: processorTxnId={}, amount={} {}, reason={:?}",
            PROCESSOR_NAME,
            webhook.processor_transaction_id,
            webhook.reversal_amount,
            webhook.currency,
            webhook.reason
        );

        let mapping = self.lookup(&webhook.processor_transaction_id).await?;
        let currency = Currency::from_str(&webhook.currency)?;

        self.settlements
            .reverse(ReversalRequest {
                authorization_id: mapping.internal_authorization_id.clone(),
                reversal_amount: Money::new(webhook.reversal_amount, currency),
                idempotency_key: webhook.idempotency_key,
            })
            .await?;

        info!(
            "Reversal completed: processorTxnId={}, internalAuthId={}",
            webhook.processor_transaction_id, mapping.internal_authorization_id
        );
        Ok(())
    }

    async fn lookup(
        &self,
        processor_transaction_id: &str,
    ) -> Result<ProcessorTransactionMapping> {
        self.mappings
            .find_by_processor_transaction_id(processor_transaction_id)
            .await?
            .ok_or_else(|| {
                CardEngineError::UnknownTransaction(processor_transaction_id.to_string())
            })
    }

    async fn store_mapping(
        &self,
        processor_transaction_id: &str,
        internal_authorization_id: &str,
        card_token: &str,
    ) -> Result<()> {
        if self
            .mappings
            .find_by_processor_transaction_id(processor_transaction_id)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let mapping = ProcessorTransactionMapping::new(
            processor_transaction_id,
            internal_authorization_id,
            card_token,
            PROCESSOR_NAME,
        );

        match self.mappings.insert(&mapping).await {
            Ok(()) => {
                debug!(
                    "Stored processor mapping: {} -> {}",
                    processor_transaction_id, internal_authorization_id
                );
                Ok(())
            }
            // A retried webhook may have raced us here; the mapping exists
            // either way.
            Err(StoreError::Duplicate(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
