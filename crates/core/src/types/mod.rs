//! Core types for the Cloudberry client.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod owner;
pub mod price;
pub mod product;

pub use id::{SessionId, UserId};
pub use owner::OwnerId;
pub use price::{CurrencyCode, Price};
pub use product::{ProductRef, ProductRefError};
