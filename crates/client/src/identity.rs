//! Authentication state machine.
//!
//! Both reconciliation engines run the same explicit machine:
//! `Guest -> Authenticating -> Authenticated`. The merge of guest and
//! server state fires exactly on the `Authenticating -> Authenticated`
//! edge, which the host drives with identity events; there is no polling
//! and no lock behind the once-per-login guarantee.

use cloudberry_core::{OwnerId, UserId};

/// Authentication state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Anonymous browsing; guest partitions are active.
    Guest,
    /// A sign-in is in flight; mutations still land in guest partitions.
    Authenticating,
    /// Signed in; the user's partitions are active.
    Authenticated(UserId),
}

impl AuthState {
    /// The partition owner for this state.
    ///
    /// `Authenticating` still writes to the guest partition - the merge
    /// has not happened yet.
    #[must_use]
    pub const fn owner(self) -> OwnerId {
        match self {
            Self::Guest | Self::Authenticating => OwnerId::Guest,
            Self::Authenticated(user) => OwnerId::User(user),
        }
    }
}

/// Identity change reported by the host's auth flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityEvent {
    /// The user started signing in.
    LoginStarted,
    /// The backend confirmed the sign-in.
    LoginSucceeded(UserId),
    /// The sign-in attempt failed.
    LoginFailed,
    /// The user signed out.
    LoggedOut,
}

/// Effect of applying an event to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed; no reconciliation work required.
    Entered(AuthState),
    /// The `Authenticating -> Authenticated` edge: merge guest state into
    /// the server, then adopt the server's view.
    Reconcile(UserId),
    /// The event is not legal in the current state and was dropped.
    Ignored,
}

impl AuthState {
    /// The transition table.
    ///
    /// Returns the next state and what the caller must do about it.
    /// Illegal pairs leave the state untouched.
    #[must_use]
    pub fn apply(self, event: IdentityEvent) -> (Self, Transition) {
        match (self, event) {
            (Self::Guest, IdentityEvent::LoginStarted) => {
                (Self::Authenticating, Transition::Entered(Self::Authenticating))
            }
            (Self::Authenticating, IdentityEvent::LoginSucceeded(user)) => {
                (Self::Authenticated(user), Transition::Reconcile(user))
            }
            (Self::Authenticating, IdentityEvent::LoginFailed) => {
                (Self::Guest, Transition::Entered(Self::Guest))
            }
            (Self::Authenticated(_) | Self::Authenticating, IdentityEvent::LoggedOut) => {
                (Self::Guest, Transition::Entered(Self::Guest))
            }
            (state, event) => {
                tracing::debug!(?state, ?event, "identity event ignored in current state");
                (state, Transition::Ignored)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId::new(Uuid::new_v4())
    }

    #[test]
    fn test_happy_path_reconciles_exactly_on_the_final_edge() {
        let user = user();
        let (state, transition) = AuthState::Guest.apply(IdentityEvent::LoginStarted);
        assert_eq!(state, AuthState::Authenticating);
        assert_eq!(transition, Transition::Entered(AuthState::Authenticating));

        let (state, transition) = state.apply(IdentityEvent::LoginSucceeded(user));
        assert_eq!(state, AuthState::Authenticated(user));
        assert_eq!(transition, Transition::Reconcile(user));

        // A duplicate success event does not re-trigger the merge.
        let (state, transition) = state.apply(IdentityEvent::LoginSucceeded(user));
        assert_eq!(state, AuthState::Authenticated(user));
        assert_eq!(transition, Transition::Ignored);
    }

    #[test]
    fn test_login_failure_returns_to_guest() {
        let (state, _) = AuthState::Guest.apply(IdentityEvent::LoginStarted);
        let (state, transition) = state.apply(IdentityEvent::LoginFailed);
        assert_eq!(state, AuthState::Guest);
        assert_eq!(transition, Transition::Entered(AuthState::Guest));
    }

    #[test]
    fn test_success_without_login_started_is_ignored() {
        let (state, transition) = AuthState::Guest.apply(IdentityEvent::LoginSucceeded(user()));
        assert_eq!(state, AuthState::Guest);
        assert_eq!(transition, Transition::Ignored);
    }

    #[test]
    fn test_logout_from_authenticated_returns_to_guest() {
        let user = user();
        let (state, transition) = AuthState::Authenticated(user).apply(IdentityEvent::LoggedOut);
        assert_eq!(state, AuthState::Guest);
        assert_eq!(transition, Transition::Entered(AuthState::Guest));
    }

    #[test]
    fn test_logout_while_guest_is_ignored() {
        let (state, transition) = AuthState::Guest.apply(IdentityEvent::LoggedOut);
        assert_eq!(state, AuthState::Guest);
        assert_eq!(transition, Transition::Ignored);
    }

    #[test]
    fn test_owner_follows_state() {
        let user = user();
        assert_eq!(AuthState::Guest.owner(), OwnerId::Guest);
        assert_eq!(AuthState::Authenticating.owner(), OwnerId::Guest);
        assert_eq!(AuthState::Authenticated(user).owner(), OwnerId::User(user));
    }
}
