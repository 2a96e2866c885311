//! Apache Fineract adapter
//!
//! Reference CBS integration. Fineract has no native card-style
//! authorization holds, so the adapter emulates them with shadow journal
//! entries against a dedicated liability GL account:
//!
//! - `place_hold`: post `DEBIT savings / CREDIT holds-GL`, keep a hold
//!   record keyed by the authorization reference. Funds leave the
//!   available balance without leaving the account.
//! - `commit_debit`: post the reversing journal, then withdraw from
//!   savings, then mark the hold committed. No double debit is possible
//!   because the reversal and the withdrawal cancel out except for the
//!   committed amount.
//! - `release_hold`: post only the reversing journal and mark the hold
//!   released.
//!
//! The Fineract ledger stays balanced at every step and each movement is
//! auditable as a native Fineract transaction. Idempotency is enforced by
//! the hold-record lookup before any CBS call. A CBS with native holds
//! should use those instead.

pub mod client;
pub mod dtos;
pub mod holds;

use crate::error::{BankError, Result};
use crate::BankAccountAdapter;
use async_trait::async_trait;
use card_core::money::{Currency, Money};
use chrono::{NaiveDate, Utc};
use dtos::{GlAmount, JournalEntryRequest, SavingsTransactionRequest};
use holds::{HoldRecord, HoldStatus, HoldStore};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub use client::FineractClient;

// Fineract's expected transaction date format, e.g. "02 August 2026".
const DATE_FORMAT: &str = "%d %B %Y";
const HEAD_OFFICE_ID: i64 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct FineractConfig {
    pub base_url: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    /// Liability GL account holding reserved funds.
    pub holds_gl_account: i64,
    pub balance_timeout_ms: u64,
    pub hold_timeout_ms: u64,
}

pub struct FineractAdapter {
    client: FineractClient,
    holds: Arc<dyn HoldStore>,
    holds_gl_account: i64,
}

impl FineractAdapter {
    pub fn new(config: &FineractConfig, holds: Arc<dyn HoldStore>) -> Self {
        let client = FineractClient::new(
            config.base_url.clone(),
            config.tenant.clone(),
            config.username.clone(),
            config.password.clone(),
            Duration::from_millis(config.balance_timeout_ms),
            Duration::from_millis(config.hold_timeout_ms),
        );
        info!(
            "Fineract adapter configured with holds GL account {}",
            config.holds_gl_account
        );
        Self {
            client,
            holds,
            holds_gl_account: config.holds_gl_account,
        }
    }

    fn parse_account_ref(account_ref: &str, op: &'static str) -> Result<i64> {
        account_ref.parse::<i64>().map_err(|_| {
            BankError::core(
                account_ref,
                op,
                format!("Invalid Fineract account reference: {}", account_ref),
            )
        })
    }

    fn parse_currency(code: &str) -> Currency {
        Currency::from_str(code).unwrap_or_else(|_| {
            warn!("Unknown currency from Fineract: {}, defaulting to USD", code);
            Currency::USD
        })
    }

    async fn post_reversing_journal(&self, hold: &HoldRecord, op: &'static str) -> Result<()> {
        let savings_account_id = Self::parse_account_ref(&hold.account_ref, op)?;
        let entry = reversing_journal(
            savings_account_id,
            self.holds_gl_account,
            hold.amount,
            &hold.authorization_id,
            Utc::now().date_naive(),
        );
        self.client
            .create_journal_entry(&entry)
            .await
            .map_err(|e| BankError::core(&hold.account_ref, op, e))?;
        Ok(())
    }
}

/// Shadow entry placed at hold time: DEBIT savings, CREDIT holds GL.
fn hold_journal(
    savings_account_id: i64,
    holds_gl_account: i64,
    amount: Decimal,
    reference_id: &str,
    date: NaiveDate,
) -> JournalEntryRequest {
    JournalEntryRequest {
        office_id: HEAD_OFFICE_ID,
        transaction_date: date.format(DATE_FORMAT).to_string(),
        reference_number: reference_id.to_string(),
        comments: format!("Card authorization hold - {}", reference_id),
        debits: vec![GlAmount {
            gl_account_id: savings_account_id,
            amount,
        }],
        credits: vec![GlAmount {
            gl_account_id: holds_gl_account,
            amount,
        }],
    }
}

/// Offsetting entry posted at commit or release time: DEBIT holds GL,
/// CREDIT savings.
fn reversing_journal(
    savings_account_id: i64,
    holds_gl_account: i64,
    amount: Decimal,
    reference_id: &str,
    date: NaiveDate,
) -> JournalEntryRequest {
    JournalEntryRequest {
        office_id: HEAD_OFFICE_ID,
        transaction_date: date.format(DATE_FORMAT).to_string(),
        reference_number: format!("{}-REVERSE", reference_id),
        comments: format!("Reverse authorization hold - {}", reference_id),
        debits: vec![GlAmount {
            gl_account_id: holds_gl_account,
            amount,
        }],
        credits: vec![GlAmount {
            gl_account_id: savings_account_id,
            amount,
        }],
    }
}

#[async_trait]
impl BankAccountAdapter for FineractAdapter {
    async fn available_balance(&self, account_ref: &str) -> Result<Money> {
        let savings_account_id = Self::parse_account_ref(account_ref, "getAvailableBalance")?;

        let balance = self
            .client
            .account_balance(savings_account_id)
            .await
            .map_err(|e| BankError::core(account_ref, "getAvailableBalance", e))?;

        Ok(Money::new(
            balance.available_balance,
            Self::parse_currency(&balance.currency),
        ))
    }

    async fn place_hold(&self, account_ref: &str, amount: Money, reference_id: &str) -> Result<()> {
        info!(
            "Placing hold in Fineract: account={}, amount={}, ref={}",
            account_ref, amount, reference_id
        );

        // Idempotency: the hold-record lookup happens before any CBS call.
        if let Some(existing) = self
            .holds
            .find(reference_id)
            .await
            .map_err(|e| BankError::core(account_ref, "placeHold", e))?
        {
            info!(
                "Hold already exists for reference {}: {}",
                reference_id, existing.status
            );
            return Ok(());
        }

        let savings_account_id = Self::parse_account_ref(account_ref, "placeHold")?;

        let available = self.available_balance(account_ref).await?;
        let insufficient = available
            .is_less_than(&amount)
            .map_err(|e| BankError::core(account_ref, "placeHold", e))?;
        if insufficient {
            return Err(BankError::InsufficientFunds {
                account_ref: account_ref.to_string(),
                required: amount,
                available,
            });
        }

        let entry = hold_journal(
            savings_account_id,
            self.holds_gl_account,
            amount.amount(),
            reference_id,
            Utc::now().date_naive(),
        );
        let journal = self
            .client
            .create_journal_entry(&entry)
            .await
            .map_err(|e| BankError::core(account_ref, "placeHold", e))?;

        let hold = HoldRecord::active(
            reference_id,
            account_ref,
            journal.transaction_id.clone(),
            amount.amount(),
            amount.currency(),
        );
        if let Err(e) = self.holds.insert(&hold).await {
            // A concurrent writer got the record in first; the hold exists
            // either way.
            if matches!(e, card_core::store::StoreError::Duplicate(_)) {
                return Ok(());
            }
            return Err(BankError::core(account_ref, "placeHold", e));
        }

        info!(
            "Hold placed: ref={}, journalId={}",
            reference_id, journal.transaction_id
        );
        Ok(())
    }

    async fn commit_debit(&self, account_ref: &str, amount: Money, reference_id: &str) -> Result<()> {
        info!(
            "Committing debit in Fineract: account={}, amount={}, ref={}",
            account_ref, amount, reference_id
        );

        let mut hold = self
            .holds
            .find(reference_id)
            .await
            .map_err(|e| BankError::core(account_ref, "commitDebit", e))?
            .ok_or_else(|| {
                BankError::core(
                    account_ref,
                    "commitDebit",
                    format!("No hold found for reference: {}", reference_id),
                )
            })?;

        match hold.status {
            HoldStatus::Committed => {
                info!("Hold already committed: ref={}", reference_id);
                return Ok(());
            }
            HoldStatus::Released => {
                return Err(BankError::core(
                    account_ref,
                    "commitDebit",
                    format!("Hold is not active: {}", hold.status),
                ));
            }
            HoldStatus::Active => {}
        }

        let held = Money::new(hold.amount, hold.currency);
        let over_hold = amount
            .is_greater_than(&held)
            .map_err(|e| BankError::core(account_ref, "commitDebit", e))?;
        if over_hold {
            return Err(BankError::core(
                account_ref,
                "commitDebit",
                "Cannot commit more than held amount",
            ));
        }

        // Return the held funds to the available balance, then take the
        // actual withdrawal.
        self.post_reversing_journal(&hold, "commitDebit").await?;

        let savings_account_id = Self::parse_account_ref(account_ref, "commitDebit")?;
        let debit = SavingsTransactionRequest {
            transaction_date: Utc::now().date_naive().format(DATE_FORMAT).to_string(),
            transaction_amount: amount.amount(),
            note: format!("Card transaction cleared - {}", reference_id),
            reference_number: reference_id.to_string(),
        };
        self.client
            .withdraw(savings_account_id, &debit)
            .await
            .map_err(|e| BankError::core(account_ref, "commitDebit", e))?;

        hold.mark_committed();
        self.holds
            .update(&hold)
            .await
            .map_err(|e| BankError::core(account_ref, "commitDebit", e))?;

        info!("Debit committed: ref={}", reference_id);
        Ok(())
    }

    async fn release_hold(&self, account_ref: &str, _amount: Money, reference_id: &str) -> Result<()> {
        info!(
            "Releasing hold in Fineract: account={}, ref={}",
            account_ref, reference_id
        );

        let Some(mut hold) = self
            .holds
            .find(reference_id)
            .await
            .map_err(|e| BankError::core(account_ref, "releaseHold", e))?
        else {
            warn!("No hold found for reference: {}", reference_id);
            return Ok(());
        };

        match hold.status {
            HoldStatus::Released => {
                info!("Hold already released: ref={}", reference_id);
                return Ok(());
            }
            HoldStatus::Committed => {
                warn!(
                    "Hold is not active, status={}: ref={}",
                    hold.status, reference_id
                );
                return Ok(());
            }
            HoldStatus::Active => {}
        }

        self.post_reversing_journal(&hold, "releaseHold").await?;

        hold.mark_released();
        self.holds
            .update(&hold)
            .await
            .map_err(|e| {
                error!("Failed to mark hold released: ref={}", reference_id);
                BankError::core(account_ref, "releaseHold", e)
            })?;

        info!("Hold released: ref={}", reference_id);
        Ok(())
    }

    fn adapter_name(&self) -> &'static str {
        "Fineract"
    }

    async fn is_healthy(&self) -> bool {
        // TODO: probe a dedicated Fineract health endpoint once the
        // deployment exposes one; a balance call is too expensive here.
        true
    }
}
