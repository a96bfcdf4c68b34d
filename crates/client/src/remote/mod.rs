//! Remote collaborator contracts.
//!
//! The engines mirror local mutations to the storefront backend through
//! these traits. Mirroring is best-effort and asynchronous: the caller's
//! optimistic local state is visible before any network round trip, and
//! every mirror resolves to an explicit [`SyncOutcome`] consumed by the
//! owning engine's policy - the cart ignores failures, favorites
//! compensates by rolling the local flip back. That asymmetry is
//! deliberate product behavior; do not unify it.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cloudberry_core::{Price, ProductRef};

/// Errors from a remote collaborator.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or build a request.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The background mirror task itself failed.
    #[error("Sync task error: {0}")]
    Task(String),
}

/// One line of the server's cart view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCartLine {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price: Price,
}

/// The remote cart API.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// Fetch the authoritative cart for the signed-in user.
    async fn fetch_cart(&self) -> Result<Vec<RemoteCartLine>, RemoteError>;

    /// Set a line's quantity, creating the line if absent. Idempotent.
    async fn set_line(&self, product: &ProductRef, quantity: u32) -> Result<(), RemoteError>;

    /// Remove a line.
    async fn remove_line(&self, product: &ProductRef) -> Result<(), RemoteError>;

    /// Empty the cart.
    async fn clear(&self) -> Result<(), RemoteError>;
}

/// The remote favorites API.
#[async_trait]
pub trait RemoteFavorites: Send + Sync {
    /// Fetch the favorited product references for the signed-in user.
    async fn fetch_favorites(&self) -> Result<Vec<ProductRef>, RemoteError>;

    /// Add one favorite. Idempotent.
    async fn add(&self, product: &ProductRef) -> Result<(), RemoteError>;

    /// Remove one favorite. Idempotent.
    async fn remove(&self, product: &ProductRef) -> Result<(), RemoteError>;
}

/// Result of one background mirror.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The remote accepted the write.
    Applied,
    /// The remote rejected the write or was unreachable; the owning
    /// engine's policy decided what happened to local state.
    Failed(RemoteError),
    /// No mirror was needed (guest mode, or the mutation was a no-op).
    Skipped,
}

impl SyncOutcome {
    /// Whether the remote accepted the write.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Whether the mirror failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Handle on a background mirror task.
///
/// Dropping the handle detaches the task; the UI never has to await a
/// mirror. Tests await [`SyncHandle::settled`] to observe the outcome and
/// any compensation it triggered.
#[derive(Debug)]
pub struct SyncHandle {
    task: Option<tokio::task::JoinHandle<SyncOutcome>>,
}

impl SyncHandle {
    /// Wrap a spawned mirror task.
    pub(crate) const fn spawned(task: tokio::task::JoinHandle<SyncOutcome>) -> Self {
        Self { task: Some(task) }
    }

    /// A mirror that never ran.
    #[must_use]
    pub(crate) const fn skipped() -> Self {
        Self { task: None }
    }

    /// Wait for the mirror (and its policy) to finish.
    pub async fn settled(self) -> SyncOutcome {
        match self.task {
            Some(task) => task
                .await
                .unwrap_or_else(|e| SyncOutcome::Failed(RemoteError::Task(e.to_string()))),
            None => SyncOutcome::Skipped,
        }
    }
}
