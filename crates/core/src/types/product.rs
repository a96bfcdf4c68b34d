//! Validated product reference.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error validating a product reference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductRefError {
    /// The reference was empty or whitespace-only.
    #[error("product reference must not be empty")]
    Empty,
}

/// Reference to a product as known by the storefront backend.
///
/// Opaque to the client; equality is the only operation the persistence
/// layer relies on. Ordered so favorite sets have a stable iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRef(String);

impl ProductRef {
    /// Parse a product reference, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `ProductRefError::Empty` if nothing remains after trimming.
    pub fn parse(raw: &str) -> Result<Self, ProductRefError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProductRefError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
