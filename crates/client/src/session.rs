//! Session-lifetime identity.
//!
//! Tracks a per-browser session identifier and the identity that currently
//! owns the active storage partitions. The session id is generated on
//! first access and never persisted, so it changes across restarts; the
//! owner flips between guest and a concrete user as the host reports
//! sign-in and sign-out. All operations are synchronous and never block.

use std::sync::{Arc, Mutex};

use cloudberry_core::{OwnerId, SessionId, UserId};

/// Session identity manager.
///
/// Cheaply cloneable handle shared by the engines and the ledger.
#[derive(Clone)]
pub struct SessionIdentity {
    inner: Arc<IdentityInner>,
}

struct IdentityInner {
    session_id: SessionId,
    owner: Mutex<OwnerId>,
}

impl SessionIdentity {
    /// Create a fresh session identity bound to the guest owner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(IdentityInner {
                session_id: SessionId::generate(),
                owner: Mutex::new(OwnerId::Guest),
            }),
        }
    }

    /// The identifier of this browsing session.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.inner.session_id
    }

    /// The identity currently owning the active partitions.
    #[must_use]
    pub fn current_owner(&self) -> OwnerId {
        *lock(&self.inner.owner)
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        match self.current_owner() {
            OwnerId::Guest => None,
            OwnerId::User(id) => Some(id),
        }
    }

    /// Bind the session to an authenticated user.
    pub fn bind_user(&self, user: UserId) {
        *lock(&self.inner.owner) = OwnerId::User(user);
    }

    /// Return the session to guest ownership.
    pub fn reset_to_guest(&self) {
        *lock(&self.inner.owner) = OwnerId::Guest;
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_starts_as_guest() {
        let identity = SessionIdentity::new();
        assert_eq!(identity.current_owner(), OwnerId::Guest);
        assert!(identity.current_user().is_none());
    }

    #[test]
    fn test_bind_and_reset() {
        let identity = SessionIdentity::new();
        let user = UserId::new(Uuid::new_v4());

        identity.bind_user(user);
        assert_eq!(identity.current_owner(), OwnerId::User(user));
        assert_eq!(identity.current_user(), Some(user));

        identity.reset_to_guest();
        assert_eq!(identity.current_owner(), OwnerId::Guest);
    }

    #[test]
    fn test_session_id_is_stable_across_clones() {
        let identity = SessionIdentity::new();
        let clone = identity.clone();
        assert_eq!(identity.session_id(), clone.session_id());
    }
}
