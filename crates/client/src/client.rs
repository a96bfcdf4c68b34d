//! The storefront client facade.
//!
//! Wires the store, session identity, consent gate, activity ledger and
//! both reconciliation engines together, and exposes the surface the UI
//! layer calls. Cheaply cloneable via `Arc`.

use std::sync::Arc;

use thiserror::Error;

use cloudberry_core::ProductRef;

use crate::activity::{ActivityKind, ActivityLedger, Insights, PageTimer, SearchObserver};
use crate::cart::CartEngine;
use crate::config::ClientConfig;
use crate::consent::{ConsentDecision, ConsentGate, ConsentRecord};
use crate::favorites::FavoritesEngine;
use crate::identity::IdentityEvent;
use crate::remote::http::{HttpCartApi, HttpFavoritesApi};
use crate::remote::{RemoteCart, RemoteError, RemoteFavorites, SyncHandle};
use crate::session::SessionIdentity;
use crate::store::{CappedChannel, FileChannel, LocalStore, PersistenceChannel};

/// Errors constructing the client.
///
/// Construction is the only surface that errors; once built, every
/// operation degrades silently per its subsystem's policy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration was missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A remote API client failed to build.
    #[error("Remote client error: {0}")]
    Remote(#[from] RemoteError),

    /// The storage directory could not be opened.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

struct ClientInner {
    config: ClientConfig,
    identity: SessionIdentity,
    consent: ConsentGate,
    ledger: ActivityLedger,
    timer: PageTimer,
    search: SearchObserver,
    cart: CartEngine,
    favorites: FavoritesEngine,
}

/// The client the UI layer talks to.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<ClientInner>,
}

impl StorefrontClient {
    /// Build a client against the configured backend and storage
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the storage directory cannot be opened or
    /// an HTTP client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let channel: Arc<dyn PersistenceChannel> =
            Arc::new(FileChannel::open(&config.storage_dir)?);
        let cart_api: Arc<dyn RemoteCart> = Arc::new(HttpCartApi::new(&config)?);
        let favorites_api: Arc<dyn RemoteFavorites> = Arc::new(HttpFavoritesApi::new(&config)?);
        Ok(Self::with_collaborators(
            config,
            channel,
            cart_api,
            favorites_api,
        ))
    }

    /// Build a client over explicit collaborators.
    ///
    /// The seam hosts and tests use to supply their own channel and remote
    /// APIs.
    #[must_use]
    pub fn with_collaborators(
        config: ClientConfig,
        channel: Arc<dyn PersistenceChannel>,
        cart_api: Arc<dyn RemoteCart>,
        favorites_api: Arc<dyn RemoteFavorites>,
    ) -> Self {
        let store = LocalStore::new(Arc::clone(&channel), config.snapshot_ttl_days);

        // The consent record travels through the size-capped channel, the
        // way a consent cookie would.
        let capped: Arc<dyn PersistenceChannel> = Arc::new(CappedChannel::new(
            channel,
            config.cookie_byte_ceiling,
        ));
        let consent_store = LocalStore::new(capped, config.snapshot_ttl_days);

        let identity = SessionIdentity::new();
        let consent = ConsentGate::new(consent_store);
        let ledger = ActivityLedger::new(store.clone(), consent.clone(), identity.clone());
        let timer = PageTimer::new(ledger.clone());
        let search = SearchObserver::new(ledger.clone(), config.search_path.clone());
        let cart = CartEngine::new(store.clone(), cart_api, ledger.clone());
        let favorites = FavoritesEngine::new(store, favorites_api, ledger.clone());

        Self {
            inner: Arc::new(ClientInner {
                config,
                identity,
                consent,
                ledger,
                timer,
                search,
                cart,
                favorites,
            }),
        }
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get the session identity manager.
    #[must_use]
    pub fn session(&self) -> &SessionIdentity {
        &self.inner.identity
    }

    /// Get the cart engine.
    #[must_use]
    pub fn cart(&self) -> &CartEngine {
        &self.inner.cart
    }

    /// Get the favorites engine.
    #[must_use]
    pub fn favorites(&self) -> &FavoritesEngine {
        &self.inner.favorites
    }

    /// Get the page timer.
    #[must_use]
    pub fn page_timer(&self) -> &PageTimer {
        &self.inner.timer
    }

    /// Get the search observer to register with the host's HTTP layer.
    #[must_use]
    pub fn search_observer(&self) -> &SearchObserver {
        &self.inner.search
    }

    // =========================================================================
    // UI surface
    // =========================================================================

    /// Record an interaction event. Consent-gated; silently refused when
    /// the matching category is denied.
    pub fn track_activity(&self, kind: ActivityKind, payload: serde_json::Value) {
        self.inner.ledger.track(kind, payload);
    }

    /// Compute insights over the recorded activity.
    #[must_use]
    pub fn get_insights(&self) -> Insights {
        self.inner.ledger.insights()
    }

    /// The current consent decision.
    #[must_use]
    pub fn get_consent(&self) -> ConsentDecision {
        self.inner.consent.get_consent()
    }

    /// Record a consent decision.
    pub fn set_consent(&self, record: ConsentRecord) {
        self.inner.consent.set_consent(record);
    }

    /// Flip a product's favorite membership.
    pub fn toggle_favorite(&self, product: &ProductRef) -> SyncHandle {
        self.inner.favorites.toggle(product)
    }

    /// Whether a product is favorited.
    #[must_use]
    pub fn is_favorite(&self, product: &ProductRef) -> bool {
        self.inner.favorites.is_favorite(product)
    }

    /// Remove every favorite.
    pub fn clear_favorites(&self) -> SyncHandle {
        self.inner.favorites.clear()
    }

    /// Drive the identity state machines.
    ///
    /// The host's auth flow calls this once per identity change; the
    /// guest-to-authenticated merge runs inside the successful-sign-in
    /// call and exactly once.
    pub async fn handle_identity_event(&self, event: IdentityEvent) {
        self.inner.cart.handle_identity_event(event).await;
        self.inner.favorites.handle_identity_event(event).await;

        // The bound owner follows the machine, so a misfired event that
        // the engines ignored leaves the session untouched too.
        match self.inner.cart.auth_state() {
            crate::identity::AuthState::Authenticated(user) => self.inner.identity.bind_user(user),
            crate::identity::AuthState::Guest | crate::identity::AuthState::Authenticating => {
                self.inner.identity.reset_to_guest();
            }
        }
    }
}
