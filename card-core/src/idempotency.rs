//! Idempotency key generation and shape validation
//!
//! Keys are opaque identifiers supplied by the caller (or generated server
//! side). Only the shape is checked here; uniqueness is enforced by the
//! stores' unique constraints.

use crate::error::{Error, Result};
use uuid::Uuid;

const MAX_KEY_LENGTH: usize = 128;

pub fn generate() -> String {
    Uuid::new_v4().to_string()
}

pub fn is_valid(key: &str) -> bool {
    let trimmed = key.trim();
    !trimmed.is_empty()
        && key.len() <= MAX_KEY_LENGTH
        && key.chars().all(|c| c.is_ascii_graphic())
}

/// Fail-fast shape check used at every pipeline entrypoint.
pub fn validate(key: &str) -> Result<()> {
    if !is_valid(key) {
        return Err(Error::InvalidIdempotencyKey(key.to_string()));
    }
    Ok(())
}
