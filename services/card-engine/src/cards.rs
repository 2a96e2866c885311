//! Card lifecycle service

use crate::errors::{CardEngineError, Result};
use card_core::card::Card;
use card_core::store::CardStore;
use std::sync::Arc;
use tracing::info;

pub struct CardService {
    cards: Arc<dyn CardStore>,
}

impl CardService {
    pub fn new(cards: Arc<dyn CardStore>) -> Self {
        Self { cards }
    }

    pub async fn get_card(&self, card_id: &str) -> Result<Card> {
        self.cards
            .find_by_card_id(card_id)
            .await?
            .ok_or_else(|| CardEngineError::NotFound(format!("Card not found: {}", card_id)))
    }

    /// Freezing does not coordinate with in-flight authorizations: one
    /// already past card validation may still complete; the next request
    /// sees FROZEN and declines.
    pub async fn freeze(&self, card_id: &str) -> Result<Card> {
        self.transition(card_id, |card| card.freeze()).await
    }

    pub async fn unfreeze(&self, card_id: &str) -> Result<Card> {
        self.transition(card_id, |card| card.unfreeze()).await
    }

    pub async fn close(&self, card_id: &str) -> Result<Card> {
        self.transition(card_id, |card| card.close()).await
    }

    async fn transition<F>(&self, card_id: &str, apply: F) -> Result<Card>
    where
        F: FnOnce(&mut Card) -> card_core::Result<()>,
    {
        let mut card = self.get_card(card_id).await?;
        apply(&mut card)?;
        self.cards.update(&card).await?;
        info!("Card {} is now {}", card_id, card.state);
        Ok(card)
    }
}
