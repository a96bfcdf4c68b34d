//! Consent gate.
//!
//! Holds the user's consent decision per category and is consulted before
//! every tracking write. An attempt to record data without the matching
//! category is silently refused; it never surfaces as an error. The
//! consent record itself is always persisted regardless of its content,
//! since writing "the user declined" is a necessary-category operation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{LocalStore, PartitionKey};

/// Data-collection categories a user can consent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    /// Strictly necessary operation of the site. Always permitted.
    Necessary,
    /// Behavioral analytics (page views, searches, engagement).
    Analytics,
    /// Marketing and advertising.
    Marketing,
    /// Non-essential preferences (e.g., display settings).
    Preferences,
}

/// The user's recorded consent decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Whether the banner was accepted (as opposed to declined).
    pub accepted: bool,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Strictly necessary. Fixed true; normalized on load.
    pub necessary: bool,
    pub analytics: bool,
    pub marketing: bool,
    pub preferences: bool,
}

impl ConsentRecord {
    /// A decision with explicit per-category flags. `necessary` is forced
    /// true.
    #[must_use]
    pub fn decided(accepted: bool, analytics: bool, marketing: bool, preferences: bool) -> Self {
        Self {
            accepted,
            timestamp: Utc::now(),
            necessary: true,
            analytics,
            marketing,
            preferences,
        }
    }

    /// Accept every category.
    #[must_use]
    pub fn accept_all() -> Self {
        Self::decided(true, true, true, true)
    }

    /// Decline every revocable category.
    #[must_use]
    pub fn decline_all() -> Self {
        Self::decided(false, false, false, false)
    }

    /// Whether this record permits `category`.
    #[must_use]
    pub const fn allows(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Necessary => true,
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Marketing => self.marketing,
            ConsentCategory::Preferences => self.preferences,
        }
    }
}

/// The current consent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentDecision {
    /// The user has not been asked, or the stored record expired.
    Unset,
    /// The user decided.
    Decided(ConsentRecord),
}

/// Consent gate over the local store.
///
/// Cheaply cloneable; the cached record is shared across clones.
#[derive(Clone)]
pub struct ConsentGate {
    store: LocalStore,
    cached: Arc<Mutex<Option<ConsentRecord>>>,
}

impl ConsentGate {
    /// Create a gate, loading any previously persisted decision.
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        let cached = store
            .load::<ConsentRecord>(&PartitionKey::consent())
            .map(|mut record| {
                // Older records may predate the invariant.
                record.necessary = true;
                record
            });
        Self {
            store,
            cached: Arc::new(Mutex::new(cached)),
        }
    }

    /// Whether writes in `category` are currently permitted.
    ///
    /// `Unset` denies everything except `Necessary`.
    #[must_use]
    pub fn allows(&self, category: ConsentCategory) -> bool {
        if category == ConsentCategory::Necessary {
            return true;
        }
        lock(&self.cached)
            .as_ref()
            .is_some_and(|record| record.allows(category))
    }

    /// The current decision.
    #[must_use]
    pub fn get_consent(&self) -> ConsentDecision {
        lock(&self.cached)
            .clone()
            .map_or(ConsentDecision::Unset, ConsentDecision::Decided)
    }

    /// Record a decision and persist it.
    ///
    /// Persisting the record happens unconditionally; storing "declined"
    /// is itself a necessary-category write.
    pub fn set_consent(&self, mut record: ConsentRecord) {
        record.necessary = true;
        self.store.save(&PartitionKey::consent(), &record);
        *lock(&self.cached) = Some(record);
    }

    /// Revoke every revocable category, keeping the decision persisted.
    pub fn revoke(&self) {
        self.set_consent(ConsentRecord::decline_all());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryChannel;
    use std::sync::Arc as StdArc;

    fn gate() -> (ConsentGate, LocalStore) {
        let channel = StdArc::new(MemoryChannel::new());
        let store = LocalStore::new(channel, 20);
        (ConsentGate::new(store.clone()), store)
    }

    #[test]
    fn test_unset_denies_all_but_necessary() {
        let (gate, _) = gate();
        assert!(gate.allows(ConsentCategory::Necessary));
        assert!(!gate.allows(ConsentCategory::Analytics));
        assert!(!gate.allows(ConsentCategory::Marketing));
        assert!(!gate.allows(ConsentCategory::Preferences));
        assert_eq!(gate.get_consent(), ConsentDecision::Unset);
    }

    #[test]
    fn test_accept_all_permits_everything() {
        let (gate, _) = gate();
        gate.set_consent(ConsentRecord::accept_all());
        assert!(gate.allows(ConsentCategory::Analytics));
        assert!(gate.allows(ConsentCategory::Marketing));
        assert!(gate.allows(ConsentCategory::Preferences));
    }

    #[test]
    fn test_declined_record_is_still_persisted() {
        let (gate, store) = gate();
        gate.set_consent(ConsentRecord::decline_all());

        let persisted: ConsentRecord = store.load(&PartitionKey::consent()).unwrap();
        assert!(!persisted.accepted);
        assert!(persisted.necessary);
        assert!(!persisted.analytics);
    }

    #[test]
    fn test_necessary_cannot_be_revoked() {
        let (gate, _) = gate();
        let mut record = ConsentRecord::accept_all();
        record.necessary = false;
        gate.set_consent(record);

        assert!(gate.allows(ConsentCategory::Necessary));
        match gate.get_consent() {
            ConsentDecision::Decided(record) => assert!(record.necessary),
            ConsentDecision::Unset => panic!("expected a decision"),
        }
    }

    #[test]
    fn test_revoke_flips_categories_off() {
        let (gate, _) = gate();
        gate.set_consent(ConsentRecord::accept_all());
        gate.revoke();
        assert!(!gate.allows(ConsentCategory::Analytics));
        assert!(gate.allows(ConsentCategory::Necessary));
    }

    #[test]
    fn test_persisted_decision_survives_a_new_gate() {
        let channel = StdArc::new(MemoryChannel::new());
        let store = LocalStore::new(channel, 20);

        let first = ConsentGate::new(store.clone());
        first.set_consent(ConsentRecord::decided(true, true, false, false));

        // A fresh gate over the same channel sees the decision.
        let second = ConsentGate::new(store);
        assert!(second.allows(ConsentCategory::Analytics));
        assert!(!second.allows(ConsentCategory::Marketing));
    }
}
