//! Card issuance against existing CBS accounts
//!
//! Bank accounts must exist before issuance; the card is only a payment
//! instrument. Client creation, account opening, KYC and initial funding
//! all live in the CBS. Issuance verifies the account is reachable,
//! creates the card frozen, and writes the immutable card-to-account
//! mapping. Activation is a separate, explicit step.

use crate::errors::{CardEngineError, Result};
use bank_adapters::BankAccountAdapter;
use card_core::card::Card;
use card_core::mapping::BankAccountMapping;
use card_core::store::{CardStore, MappingStore};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct IssuanceService {
    cards: Arc<dyn CardStore>,
    mappings: Arc<dyn MappingStore>,
    bank: Arc<dyn BankAccountAdapter>,
}

impl IssuanceService {
    pub fn new(
        cards: Arc<dyn CardStore>,
        mappings: Arc<dyn MappingStore>,
        bank: Arc<dyn BankAccountAdapter>,
    ) -> Self {
        Self {
            cards,
            mappings,
            bank,
        }
    }

    pub async fn issue_card(
        &self,
        bank_client_ref: &str,
        bank_account_ref: &str,
        cardholder_name: &str,
        expiration_date: NaiveDate,
        issued_by: &str,
    ) -> Result<Card> {
        info!(
            "Issuing card for bank account: client={}, account={}",
            bank_client_ref, bank_account_ref
        );

        // The account must exist and be reachable before a card points at
        // it.
        match self.bank.available_balance(bank_account_ref).await {
            Ok(balance) => {
                debug!("Bank account {} verified, balance: {}", bank_account_ref, balance);
            }
            Err(e) => {
                return Err(CardEngineError::NotFound(format!(
                    "Bank account not found or inaccessible: {} ({})",
                    bank_account_ref, e
                )));
            }
        }

        let card = Card::issue(
            cardholder_name,
            generate_last4(),
            expiration_date,
            bank_client_ref,
        );
        self.cards.insert(&card).await?;

        let mapping = BankAccountMapping::new(
            card.card_id.as_str(),
            bank_client_ref,
            bank_account_ref,
            self.bank.adapter_name(),
            issued_by,
        );
        self.mappings.insert(&mapping).await?;

        info!(
            "Card issued: cardId={}, last4={}, bankAccount={}",
            card.card_id, card.last4, bank_account_ref
        );
        Ok(card)
    }

    pub async fn activate(&self, card_id: &str) -> Result<Card> {
        let mut card = self
            .cards
            .find_by_card_id(card_id)
            .await?
            .ok_or_else(|| CardEngineError::NotFound(format!("Card not found: {}", card_id)))?;

        card.activate()?;
        self.cards.update(&card).await?;

        info!("Card activated: {}", card_id);
        Ok(card)
    }
}

// In production the display suffix comes from the card processor; here it
// is derived from fresh entropy.
fn generate_last4() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let n = u16::from_be_bytes([bytes[0], bytes[1]]) % 10_000;
    format!("{:04}", n)
}
