//! Shared helpers for Cloudberry integration tests.
//!
//! Provides in-memory mock implementations of the remote collaborators
//! and a builder for a fully wired [`StorefrontClient`] over the memory
//! channel, so scenarios can drive complete guest-to-authenticated
//! journeys without a backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use cloudberry_client::client::StorefrontClient;
use cloudberry_client::config::ClientConfig;
use cloudberry_client::remote::{
    RemoteCart, RemoteCartLine, RemoteError, RemoteFavorites,
};
use cloudberry_client::store::{MemoryChannel, PersistenceChannel};
use cloudberry_core::{CurrencyCode, Price, ProductRef};

/// A price in whole dollars.
#[must_use]
pub fn dollars(amount: i64) -> Price {
    Price::new(Decimal::new(amount * 100, 2), CurrencyCode::USD)
}

/// Parse a product reference, panicking on invalid input.
///
/// # Panics
///
/// Panics when the reference is empty; test inputs are literals.
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn product(reference: &str) -> ProductRef {
    ProductRef::parse(reference).unwrap_or_else(|e| panic!("bad test product ref: {e}"))
}

/// Server-side cart the mock API maintains.
#[derive(Default)]
pub struct MockCartApi {
    lines: Mutex<HashMap<ProductRef, u32>>,
    failing: Mutex<bool>,
    set_calls: Mutex<Vec<(ProductRef, u32)>>,
}

impl MockCartApi {
    /// Seed a server-side line.
    pub fn seed(&self, product: &ProductRef, quantity: u32) {
        lock(&self.lines).insert(product.clone(), quantity);
    }

    /// Make every call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// The server's current quantity for a product.
    #[must_use]
    pub fn quantity(&self, product: &ProductRef) -> Option<u32> {
        lock(&self.lines).get(product).copied()
    }

    /// Every `set_line` call seen, in order.
    #[must_use]
    pub fn set_calls(&self) -> Vec<(ProductRef, u32)> {
        lock(&self.set_calls).clone()
    }

    fn check(&self) -> Result<(), RemoteError> {
        if *lock(&self.failing) {
            return Err(RemoteError::Api {
                status: 503,
                message: "backend down".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCart for MockCartApi {
    async fn fetch_cart(&self) -> Result<Vec<RemoteCartLine>, RemoteError> {
        self.check()?;
        Ok(lock(&self.lines)
            .iter()
            .map(|(product, quantity)| RemoteCartLine {
                product: product.clone(),
                quantity: *quantity,
                unit_price: dollars(10),
            })
            .collect())
    }

    async fn set_line(&self, product: &ProductRef, quantity: u32) -> Result<(), RemoteError> {
        self.check()?;
        lock(&self.set_calls).push((product.clone(), quantity));
        lock(&self.lines).insert(product.clone(), quantity);
        Ok(())
    }

    async fn remove_line(&self, product: &ProductRef) -> Result<(), RemoteError> {
        self.check()?;
        lock(&self.lines).remove(product);
        Ok(())
    }

    async fn clear(&self) -> Result<(), RemoteError> {
        self.check()?;
        lock(&self.lines).clear();
        Ok(())
    }
}

/// Server-side favorites the mock API maintains.
#[derive(Default)]
pub struct MockFavoritesApi {
    items: Mutex<HashSet<ProductRef>>,
    failing: Mutex<bool>,
}

impl MockFavoritesApi {
    /// Seed a server-side favorite.
    pub fn seed(&self, product: &ProductRef) {
        lock(&self.items).insert(product.clone());
    }

    /// Make every call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// Whether the server currently has the favorite.
    #[must_use]
    pub fn contains(&self, product: &ProductRef) -> bool {
        lock(&self.items).contains(product)
    }

    fn check(&self) -> Result<(), RemoteError> {
        if *lock(&self.failing) {
            return Err(RemoteError::Api {
                status: 503,
                message: "backend down".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteFavorites for MockFavoritesApi {
    async fn fetch_favorites(&self) -> Result<Vec<ProductRef>, RemoteError> {
        self.check()?;
        Ok(lock(&self.items).iter().cloned().collect())
    }

    async fn add(&self, product: &ProductRef) -> Result<(), RemoteError> {
        self.check()?;
        lock(&self.items).insert(product.clone());
        Ok(())
    }

    async fn remove(&self, product: &ProductRef) -> Result<(), RemoteError> {
        self.check()?;
        lock(&self.items).remove(product);
        Ok(())
    }
}

/// A fully wired client plus handles on its collaborators.
pub struct TestHarness {
    pub client: StorefrontClient,
    pub cart_api: Arc<MockCartApi>,
    pub favorites_api: Arc<MockFavoritesApi>,
    pub channel: Arc<MemoryChannel>,
}

impl TestHarness {
    /// Build a client over a fresh memory channel and mock remotes.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded test base URL fails to parse.
    #[must_use]
    pub fn new() -> Self {
        let channel = Arc::new(MemoryChannel::new());
        Self::over_channel(channel)
    }

    /// Build a client over an existing channel, simulating a restart when
    /// the channel carries earlier state.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded test base URL fails to parse.
    #[must_use]
    pub fn over_channel(channel: Arc<MemoryChannel>) -> Self {
        let config = ClientConfig::new(
            "https://shop.test".parse().unwrap_or_else(|e| panic!("bad test url: {e}")),
            std::path::PathBuf::from("unused"),
        );
        let cart_api = Arc::new(MockCartApi::default());
        let favorites_api = Arc::new(MockFavoritesApi::default());
        let client = StorefrontClient::with_collaborators(
            config,
            Arc::clone(&channel) as Arc<dyn PersistenceChannel>,
            Arc::clone(&cart_api) as Arc<dyn RemoteCart>,
            Arc::clone(&favorites_api) as Arc<dyn RemoteFavorites>,
        );
        Self {
            client,
            cart_api,
            favorites_api,
            channel,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
