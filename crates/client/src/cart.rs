//! Cart reconciliation engine.
//!
//! Every mutation updates the in-memory and persisted snapshot
//! synchronously, then mirrors to the remote cart in the background. The
//! local snapshot is the authoritative cart: a failed mirror is logged and
//! dropped, never rolled back. At the guest-to-authenticated transition
//! the guest cart is merged into the server cart (quantities summed), the
//! guest partition is deleted, and the server's post-merge view replaces
//! the local snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::json;

use cloudberry_core::{OwnerId, Price, ProductRef, UserId};

use crate::activity::{ActivityKind, ActivityLedger};
use crate::identity::{AuthState, IdentityEvent, Transition};
use crate::remote::{RemoteCart, RemoteCartLine, RemoteError, SyncHandle, SyncOutcome};
use crate::store::{LocalStore, PartitionKey};

/// One cart line. Quantity is always at least 1; a quantity reaching 0
/// removes the line instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: ProductRef,
    pub quantity: u32,
    pub unit_price: Price,
}

/// The persisted cart payload. Owner and save time live in the store
/// envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartLine>,
}

impl CartSnapshot {
    fn position(&self, product: &ProductRef) -> Option<usize> {
        self.items.iter().position(|line| &line.product == product)
    }
}

impl From<&[RemoteCartLine]> for CartSnapshot {
    fn from(lines: &[RemoteCartLine]) -> Self {
        Self {
            items: lines
                .iter()
                .map(|line| CartLine {
                    product: line.product.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
        }
    }
}

/// A mutation to replay against the remote cart.
#[derive(Debug)]
enum MirrorOp {
    Set(ProductRef, u32),
    Remove(ProductRef),
    Clear,
}

struct CartState {
    auth: AuthState,
    snapshot: CartSnapshot,
}

/// The cart engine.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct CartEngine {
    state: Arc<Mutex<CartState>>,
    store: LocalStore,
    remote: Arc<dyn RemoteCart>,
    ledger: ActivityLedger,
}

impl CartEngine {
    /// Create an engine in the guest state, restoring any persisted guest
    /// snapshot.
    #[must_use]
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteCart>, ledger: ActivityLedger) -> Self {
        let snapshot = store
            .load(&PartitionKey::cart(OwnerId::Guest))
            .unwrap_or_default();
        Self {
            state: Arc::new(Mutex::new(CartState {
                auth: AuthState::Guest,
                snapshot,
            })),
            store,
            remote,
            ledger,
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a product, creating or growing its line.
    ///
    /// A quantity of 0 is a no-op.
    pub fn add_item(&self, product: &ProductRef, unit_price: Price, quantity: u32) -> SyncHandle {
        if quantity == 0 {
            return SyncHandle::skipped();
        }
        let new_quantity = {
            let mut state = lock(&self.state);
            let new_quantity = match state.snapshot.position(product) {
                Some(index) => {
                    let line = &mut state.snapshot.items[index];
                    line.quantity = line.quantity.saturating_add(quantity);
                    line.quantity
                }
                None => {
                    state.snapshot.items.push(CartLine {
                        product: product.clone(),
                        quantity,
                        unit_price,
                    });
                    quantity
                }
            };
            self.persist(&state);
            new_quantity
        };
        self.ledger.track(
            ActivityKind::AddToCart,
            json!({ "product": product, "quantity": quantity }),
        );
        self.mirror(MirrorOp::Set(product.clone(), new_quantity))
    }

    /// Remove a product's line. Removing an absent product is a no-op.
    pub fn remove_item(&self, product: &ProductRef) -> SyncHandle {
        {
            let mut state = lock(&self.state);
            let Some(index) = state.snapshot.position(product) else {
                return SyncHandle::skipped();
            };
            state.snapshot.items.remove(index);
            self.persist(&state);
        }
        self.ledger
            .track(ActivityKind::RemoveFromCart, json!({ "product": product }));
        self.mirror(MirrorOp::Remove(product.clone()))
    }

    /// Set a line's quantity. 0 removes the line; setting an absent
    /// product is a no-op.
    pub fn set_quantity(&self, product: &ProductRef, quantity: u32) -> SyncHandle {
        if quantity == 0 {
            return self.remove_item(product);
        }
        {
            let mut state = lock(&self.state);
            let Some(index) = state.snapshot.position(product) else {
                return SyncHandle::skipped();
            };
            state.snapshot.items[index].quantity = quantity;
            self.persist(&state);
        }
        self.mirror(MirrorOp::Set(product.clone(), quantity))
    }

    /// Empty the cart and delete its partition.
    pub fn clear(&self) -> SyncHandle {
        {
            let mut state = lock(&self.state);
            state.snapshot = CartSnapshot::default();
            self.store.delete(&PartitionKey::cart(state.auth.owner()));
        }
        self.mirror(MirrorOp::Clear)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Sum of `unit_price x quantity` over current lines.
    #[must_use]
    pub fn total(&self) -> Price {
        let state = lock(&self.state);
        let mut total: Option<Price> = None;
        for line in &state.snapshot.items {
            let line_total = line.unit_price.extend(line.quantity);
            total = Some(match total {
                Some(sum) => sum + line_total,
                None => line_total,
            });
        }
        total.unwrap_or_else(Price::zero)
    }

    /// Total quantity over current lines.
    #[must_use]
    pub fn count(&self) -> u32 {
        let state = lock(&self.state);
        state
            .snapshot
            .items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        lock(&self.state).snapshot.items.clone()
    }

    /// Current authentication state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        lock(&self.state).auth
    }

    // =========================================================================
    // Identity transitions
    // =========================================================================

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

    /// Merge the guest cart into the server cart, then adopt the server's
    /// authoritative view. Runs exactly once per successful sign-in.
    async fn reconcile(&self, user: UserId) {
        let guest_key = PartitionKey::cart(OwnerId::Guest);
        let user_key = PartitionKey::cart(OwnerId::User(user));

        let guest: CartSnapshot = self.store.load(&guest_key).unwrap_or_default();
        let cached_before: Option<CartSnapshot> = self.store.load(&user_key);

        // Server quantities, so merged lines are guest + server. Without
        // the server's view the sums cannot be computed, and replaying
        // guest-only quantities would overwrite server lines; skip the
        // replay entirely and keep the last known good view. The guest
        // partition stays in place so nothing is lost.
        let server_quantities: HashMap<ProductRef, u32> = match self.remote.fetch_cart().await {
            Ok(lines) => lines
                .into_iter()
                .map(|line| (line.product, line.quantity))
                .collect(),
            Err(error) => {
                tracing::warn!(error = %error, "pre-merge cart fetch failed; merge skipped");
                let fallback = cached_before.unwrap_or(guest);
                self.store.save(&user_key, &fallback);
                lock(&self.state).snapshot = fallback;
                return;
            }
        };

        for line in &guest.items {
            let server_quantity = server_quantities.get(&line.product).copied().unwrap_or(0);
            let merged = line.quantity.saturating_add(server_quantity);
            if let Err(error) = self.remote.set_line(&line.product, merged).await {
                tracing::warn!(product = %line.product, error = %error, "cart merge skipped a line");
            }
        }

        self.store.delete(&guest_key);

        match self.remote.fetch_cart().await {
            Ok(lines) => {
                let snapshot = CartSnapshot::from(lines.as_slice());
                self.store.save(&user_key, &snapshot);
                lock(&self.state).snapshot = snapshot;
            }
            Err(error) => {
                // Last known good: the previously cached authenticated
                // snapshot, or the guest view carried over as an interim
                // guess until the next successful fetch.
                tracing::warn!(error = %error, "authoritative cart fetch failed; keeping cached snapshot");
                let fallback = cached_before.unwrap_or(guest);
                self.store.save(&user_key, &fallback);
                lock(&self.state).snapshot = fallback;
            }
        }
    }

    /// Drop to the guest view and forget the signed-out user's partition.
    fn on_logout(&self, user: UserId) {
        self.store.delete(&PartitionKey::cart(OwnerId::User(user)));
        let mut state = lock(&self.state);
        state.snapshot = self
            .store
            .load(&PartitionKey::cart(OwnerId::Guest))
            .unwrap_or_default();
    }

    // =========================================================================
    // Remote mirroring
    // =========================================================================

    /// Persist the snapshot under the active partition.
    fn persist(&self, state: &CartState) {
        self.store
            .save(&PartitionKey::cart(state.auth.owner()), &state.snapshot);
    }

    /// Mirror a mutation to the remote cart in the background.
    ///
    /// Guests have no server cart; their mirror is skipped and their lines
    /// reach the server through the sign-in merge instead.
    fn mirror(&self, op: MirrorOp) -> SyncHandle {
        if !matches!(lock(&self.state).auth, AuthState::Authenticated(_)) {
            return SyncHandle::skipped();
        }
        let remote = Arc::clone(&self.remote);
        SyncHandle::spawned(tokio::spawn(async move {
            let result = match &op {
                MirrorOp::Set(product, quantity) => remote.set_line(product, *quantity).await,
                MirrorOp::Remove(product) => remote.remove_line(product).await,
                MirrorOp::Clear => remote.clear().await,
            };
            match result {
                Ok(()) => SyncOutcome::Applied,
                Err(error) => ignore_policy(&op, error),
            }
        }))
    }
}

/// The cart's failure policy: log and move on. The local snapshot is
/// authoritative; the remote copy is an eventually consistent mirror.
fn ignore_policy(op: &MirrorOp, error: RemoteError) -> SyncOutcome {
    tracing::warn!(?op, error = %error, "cart mirror failed; local snapshot kept");
    SyncOutcome::Failed(error)
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
