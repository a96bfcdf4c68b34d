//! Cloudberry storefront client - persistence and synchronization engine.
//!
//! This crate is the stateful half of the Cloudberry storefront UI: a cart
//! and a favorites list that survive browser restarts, behave identically
//! for guests and signed-in users, and reconcile local state with the
//! remote backend exactly once at sign-in. All behavioral tracking is
//! gated behind revocable user consent.
//!
//! # Architecture
//!
//! - [`store`] - Partitioned, TTL-aware local persistence over pluggable
//!   channels
//! - [`session`] - Session-lifetime identity (session id + bound owner)
//! - [`consent`] - Consent gate consulted before every tracking write
//! - [`activity`] - Bounded, consent-gated activity ledger with read-time
//!   insights
//! - [`identity`] - The `Guest`/`Authenticating`/`Authenticated` state
//!   machine shared by both engines
//! - [`remote`] - Remote collaborator traits and their HTTP implementations
//! - [`cart`] / [`favorites`] - The reconciliation engines
//! - [`client`] - The [`client::StorefrontClient`] facade the UI talks to

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod activity;
pub mod cart;
pub mod client;
pub mod config;
pub mod consent;
pub mod favorites;
pub mod identity;
pub mod remote;
pub mod session;
pub mod store;
pub mod telemetry;

pub use client::{ClientError, StorefrontClient};
pub use config::{ClientConfig, ConfigError};
