//! Favorites reconciliation engine.
//!
//! Mirrors the cart engine's state machine and sign-in merge, with two
//! deliberate differences: the merge is a set union (no quantities), and
//! the failure policy compensates instead of ignoring. A toggle flips
//! local membership synchronously; if the background mirror is rejected,
//! the flip is rolled back so local membership never permanently diverges
//! from the server's view.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::json;

use cloudberry_core::{OwnerId, ProductRef, UserId};

use crate::activity::{ActivityKind, ActivityLedger};
use crate::identity::{AuthState, IdentityEvent, Transition};
use crate::remote::{RemoteError, RemoteFavorites, SyncHandle, SyncOutcome};
use crate::store::{LocalStore, PartitionKey};

/// The persisted favorites payload. Owner and save time live in the store
/// envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteSet {
    pub items: BTreeSet<ProductRef>,
}

struct FavoritesState {
    auth: AuthState,
    set: FavoriteSet,
}

/// The favorites engine.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct FavoritesEngine {
    state: Arc<Mutex<FavoritesState>>,
    store: LocalStore,
    remote: Arc<dyn RemoteFavorites>,
    ledger: ActivityLedger,
}

impl FavoritesEngine {
    /// Create an engine in the guest state, restoring any persisted guest
    /// set.
    #[must_use]
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteFavorites>,
        ledger: ActivityLedger,
    ) -> Self {
        let set = store
            .load(&PartitionKey::favorites(OwnerId::Guest))
            .unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(FavoritesState {
                auth: AuthState::Guest,
                set,
            })),
            store,
            remote,
            ledger,
        }
    }

    /// Flip a product's membership.
    ///
    /// The flip is local and immediate; while authenticated it is mirrored
    /// in the background, and a rejected mirror rolls the flip back.
    pub fn toggle(&self, product: &ProductRef) -> SyncHandle {
        let now_favorite = {
            let mut state = lock(&self.state);
            let now_favorite = if state.set.items.remove(product) {
                false
            } else {
                state.set.items.insert(product.clone());
                true
            };
            self.persist(&state);
            now_favorite
        };
        self.ledger.track(
            if now_favorite {
                ActivityKind::Favorite
            } else {
                ActivityKind::Unfavorite
            },
            json!({ "product": product }),
        );

        if !matches!(lock(&self.state).auth, AuthState::Authenticated(_)) {
            return SyncHandle::skipped();
        }
        let engine = self.clone();
        let remote = Arc::clone(&self.remote);
        let product = product.clone();
        SyncHandle::spawned(tokio::spawn(async move {
            let result = if now_favorite {
                remote.add(&product).await
            } else {
                remote.remove(&product).await
            };
            match result {
                Ok(()) => SyncOutcome::Applied,
                Err(error) => engine.compensate(&product, now_favorite, error),
            }
        }))
    }

    /// Whether a product is currently favorited.
    #[must_use]
    pub fn is_favorite(&self, product: &ProductRef) -> bool {
        lock(&self.state).set.items.contains(product)
    }

    /// Current favorites, in stable order.
    #[must_use]
    pub fn items(&self) -> Vec<ProductRef> {
        lock(&self.state).set.items.iter().cloned().collect()
    }

    /// Remove every favorite and delete the partition.
    ///
    /// The remote removals are best effort; a clear is not rolled back.
    pub fn clear(&self) -> SyncHandle {
        let (items, authenticated) = {
            let mut state = lock(&self.state);
            let items: Vec<ProductRef> = state.set.items.iter().cloned().collect();
            state.set = FavoriteSet::default();
            self.store
                .delete(&PartitionKey::favorites(state.auth.owner()));
            (items, matches!(state.auth, AuthState::Authenticated(_)))
        };
        if !authenticated || items.is_empty() {
            return SyncHandle::skipped();
        }
        let remote = Arc::clone(&self.remote);
        SyncHandle::spawned(tokio::spawn(async move {
            let mut failed = None;
            for product in &items {
                if let Err(error) = remote.remove(product).await {
                    tracing::warn!(product = %product, error = %error, "favorites clear skipped a removal");
                    failed = Some(error);
                }
            }
            failed.map_or(SyncOutcome::Applied, SyncOutcome::Failed)
        }))
    }

    /// Current authentication state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        lock(&self.state).auth
    }

    /// Apply an identity event, reconciling on the authenticated edge.
    pub async fn handle_identity_event(&self, event: IdentityEvent) {
        let (previous, transition) = {
            let mut state = lock(&self.state);
            let previous = state.auth;
            let (next, transition) = previous.apply(event);
            state.auth = next;
            (previous, transition)
        };
        match transition {
            Transition::Reconcile(user) => self.reconcile(user).await,
            Transition::Entered(AuthState::Guest) => {
                if let AuthState::Authenticated(user) = previous {
                    self.on_logout(user);
                }
            }
            Transition::Entered(_) | Transition::Ignored => {}
        }
    }

    /// Union the guest set into the server's, then adopt the server's
    /// authoritative view. Runs exactly once per successful sign-in.
    async fn reconcile(&self, user: UserId) {
        let guest_key = PartitionKey::favorites(OwnerId::Guest);
        let user_key = PartitionKey::favorites(OwnerId::User(user));

        let guest: FavoriteSet = self.store.load(&guest_key).unwrap_or_default();
        let cached_before: Option<FavoriteSet> = self.store.load(&user_key);

        for product in &guest.items {
            if let Err(error) = self.remote.add(product).await {
                tracing::warn!(product = %product, error = %error, "favorites merge skipped an item");
            }
        }

        self.store.delete(&guest_key);

        match self.remote.fetch_favorites().await {
            Ok(items) => {
                let set = FavoriteSet {
                    items: items.into_iter().collect(),
                };
                self.store.save(&user_key, &set);
                lock(&self.state).set = set;
            }
            Err(error) => {
                tracing::warn!(error = %error, "authoritative favorites fetch failed; keeping cached set");
                let fallback = cached_before.unwrap_or(guest);
                self.store.save(&user_key, &fallback);
                lock(&self.state).set = fallback;
            }
        }
    }

    /// Drop to the guest view and forget the signed-out user's partition.
    fn on_logout(&self, user: UserId) {
        self.store
            .delete(&PartitionKey::favorites(OwnerId::User(user)));
        let mut state = lock(&self.state);
        state.set = self
            .store
            .load(&PartitionKey::favorites(OwnerId::Guest))
            .unwrap_or_default();
    }

    /// The favorites failure policy: roll the local flip back so local
    /// membership tracks the server's view.
    fn compensate(&self, product: &ProductRef, attempted_favorite: bool, error: RemoteError) -> SyncOutcome {
        tracing::warn!(product = %product, error = %error, "favorites mirror rejected; rolling back local flip");
        let mut state = lock(&self.state);
        if attempted_favorite {
            state.set.items.remove(product);
        } else {
            state.set.items.insert(product.clone());
        }
        self.persist(&state);
        SyncOutcome::Failed(error)
    }

    /// Persist the set under the active partition.
    fn persist(&self, state: &FavoritesState) {
        self.store
            .save(&PartitionKey::favorites(state.auth.owner()), &state.set);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::consent::ConsentGate;
    use crate::session::SessionIdentity;
    use crate::store::MemoryChannel;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use uuid::Uuid;

    /// In-memory remote favorites with switchable failure.
    #[derive(Default)]
    struct FakeRemoteFavorites {
        items: Mutex<HashSet<ProductRef>>,
        failing: Mutex<bool>,
    }

    impl FakeRemoteFavorites {
        fn seed(&self, reference: &str) {
            self.items
                .lock()
                .unwrap()
                .insert(ProductRef::parse(reference).unwrap());
        }

        fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }

        fn check(&self) -> Result<(), RemoteError> {
            if *self.failing.lock().unwrap() {
                return Err(RemoteError::Api {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteFavorites for FakeRemoteFavorites {
        async fn fetch_favorites(&self) -> Result<Vec<ProductRef>, RemoteError> {
            self.check()?;
            Ok(self.items.lock().unwrap().iter().cloned().collect())
        }

        async fn add(&self, product: &ProductRef) -> Result<(), RemoteError> {
            self.check()?;
            self.items.lock().unwrap().insert(product.clone());
            Ok(())
        }

        async fn remove(&self, product: &ProductRef) -> Result<(), RemoteError> {
            self.check()?;
            self.items.lock().unwrap().remove(product);
            Ok(())
        }
    }

    fn product(reference: &str) -> ProductRef {
        ProductRef::parse(reference).unwrap()
    }

    fn engine() -> (FavoritesEngine, Arc<FakeRemoteFavorites>, LocalStore) {
        let store = LocalStore::new(Arc::new(MemoryChannel::new()), 20);
        let consent = ConsentGate::new(store.clone());
        let ledger = ActivityLedger::new(store.clone(), consent, SessionIdentity::new());
        let remote = Arc::new(FakeRemoteFavorites::default());
        let engine = FavoritesEngine::new(
            store.clone(),
            Arc::clone(&remote) as Arc<dyn RemoteFavorites>,
            ledger,
        );
        (engine, remote, store)
    }

    async fn sign_in(engine: &FavoritesEngine, user: UserId) {
        engine.handle_identity_event(IdentityEvent::LoginStarted).await;
        engine
            .handle_identity_event(IdentityEvent::LoginSucceeded(user))
            .await;
    }

    #[tokio::test]
    async fn test_toggle_flips_membership() {
        let (engine, _, _) = engine();
        engine.toggle(&product("x"));
        assert!(engine.is_favorite(&product("x")));
        engine.toggle(&product("x"));
        assert!(!engine.is_favorite(&product("x")));
    }

    #[tokio::test]
    async fn test_toggle_persists_to_guest_partition() {
        let (engine, _, store) = engine();
        engine.toggle(&product("x"));

        let persisted: FavoriteSet = store
            .load(&PartitionKey::favorites(OwnerId::Guest))
            .unwrap();
        assert!(persisted.items.contains(&product("x")));
    }

    #[tokio::test]
    async fn test_rejected_mirror_rolls_back_the_flip() {
        let (engine, remote, _) = engine();
        sign_in(&engine, UserId::new(Uuid::new_v4())).await;
        remote.set_failing(true);

        let handle = engine.toggle(&product("x"));
        // Optimistic flip is visible immediately.
        assert!(engine.is_favorite(&product("x")));

        let outcome = handle.settled().await;
        assert!(outcome.is_failed());
        // Processed failure reverts local membership.
        assert!(!engine.is_favorite(&product("x")));
    }

    #[tokio::test]
    async fn test_rollback_is_persisted() {
        let (engine, remote, store) = engine();
        let user = UserId::new(Uuid::new_v4());
        sign_in(&engine, user).await;
        remote.set_failing(true);

        engine.toggle(&product("x")).settled().await;

        let persisted: FavoriteSet = store
            .load(&PartitionKey::favorites(OwnerId::User(user)))
            .unwrap();
        assert!(!persisted.items.contains(&product("x")));
    }

    #[tokio::test]
    async fn test_untoggle_failure_restores_membership() {
        let (engine, remote, _) = engine();
        sign_in(&engine, UserId::new(Uuid::new_v4())).await;

        engine.toggle(&product("x")).settled().await;
        remote.set_failing(true);
        engine.toggle(&product("x")).settled().await;

        // The remove was rejected, so the item stays favorited locally.
        assert!(engine.is_favorite(&product("x")));
    }

    #[tokio::test]
    async fn test_merge_is_a_set_union() {
        let (engine, remote, store) = engine();
        engine.toggle(&product("a"));
        engine.toggle(&product("b"));
        remote.seed("b");
        remote.seed("c");

        sign_in(&engine, UserId::new(Uuid::new_v4())).await;

        let items = engine.items();
        assert_eq!(items.len(), 3);
        for reference in ["a", "b", "c"] {
            assert!(engine.is_favorite(&product(reference)), "{reference}");
        }

        let guest: Option<FavoriteSet> = store.load(&PartitionKey::favorites(OwnerId::Guest));
        assert!(guest.is_none());
    }

    #[tokio::test]
    async fn test_merge_fetch_failure_keeps_guest_view() {
        let (engine, remote, _) = engine();
        engine.toggle(&product("a"));
        remote.set_failing(true);

        sign_in(&engine, UserId::new(Uuid::new_v4())).await;

        assert!(engine.is_favorite(&product("a")));
    }

    #[tokio::test]
    async fn test_logout_clears_user_partition_and_view() {
        let (engine, _, store) = engine();
        let user = UserId::new(Uuid::new_v4());
        sign_in(&engine, user).await;
        engine.toggle(&product("a")).settled().await;

        engine.handle_identity_event(IdentityEvent::LoggedOut).await;

        assert!(!engine.is_favorite(&product("a")));
        let cached: Option<FavoriteSet> =
            store.load(&PartitionKey::favorites(OwnerId::User(user)));
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (engine, remote, _) = engine();
        let user = UserId::new(Uuid::new_v4());
        sign_in(&engine, user).await;
        engine.toggle(&product("a")).settled().await;
        engine.toggle(&product("b")).settled().await;

        engine.clear().settled().await;

        assert!(engine.items().is_empty());
        assert!(remote.items.lock().unwrap().is_empty());
    }
}
