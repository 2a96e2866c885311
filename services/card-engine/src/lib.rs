//! Card Engine
//!
//! Orchestration service between a card processor and the core banking
//! system. Hosts the authorization and settlement pipelines, card
//! lifecycle and issuance, the inbound processor webhook adapter, and the
//! relational stores backing them. The CBS adapter is the only required
//! external dependency for authorization decisions.

pub mod authorization;
pub mod cards;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod issuance;
pub mod models;
pub mod processor;
pub mod settlement;
pub mod stores;

pub use authorization::AuthorizationService;
pub use cards::CardService;
pub use config::Config;
pub use errors::{CardEngineError, Result};
pub use issuance::IssuanceService;
pub use processor::ProcessorAdapter;
pub use settlement::{ClearingRequest, ReversalRequest, SettlementService};
