//! Partitioned, TTL-aware local persistence.
//!
//! [`LocalStore`] wraps a [`PersistenceChannel`] with the policy layer the
//! engines rely on: every payload is wrapped in an envelope carrying its
//! owner and save time, reads enforce the TTL and cross-partition
//! isolation, and every failure degrades to "empty" rather than
//! propagating. Saving never throws; a snapshot that cannot be serialized
//! is logged and skipped.

pub mod channel;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use cloudberry_core::OwnerId;

pub use channel::{CappedChannel, FileChannel, MemoryChannel, PersistenceChannel};

/// Storage namespaces, one per subsystem.
pub mod namespaces {
    /// Cart snapshots.
    pub const CART: &str = "cart";

    /// Favorite sets.
    pub const FAVORITES: &str = "favorites";

    /// The consent record.
    pub const CONSENT: &str = "consent";

    /// The persistent activity ledger.
    pub const ACTIVITY: &str = "activity";
}

/// A storage slice scoped to one namespace and one owning identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    namespace: &'static str,
    owner: OwnerId,
}

impl PartitionKey {
    /// Create a partition key.
    #[must_use]
    pub const fn new(namespace: &'static str, owner: OwnerId) -> Self {
        Self { namespace, owner }
    }

    /// Cart partition for `owner`.
    #[must_use]
    pub const fn cart(owner: OwnerId) -> Self {
        Self::new(namespaces::CART, owner)
    }

    /// Favorites partition for `owner`.
    #[must_use]
    pub const fn favorites(owner: OwnerId) -> Self {
        Self::new(namespaces::FAVORITES, owner)
    }

    /// Consent partition.
    ///
    /// Consent is a property of the browser, not of an account, so it
    /// always lives in the guest partition.
    #[must_use]
    pub const fn consent() -> Self {
        Self::new(namespaces::CONSENT, OwnerId::Guest)
    }

    /// Persistent activity-ledger partition.
    #[must_use]
    pub const fn activity() -> Self {
        Self::new(namespaces::ACTIVITY, OwnerId::Guest)
    }

    /// The owner this partition belongs to.
    #[must_use]
    pub const fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Channel key for this partition.
    #[must_use]
    pub fn render(&self) -> String {
        format!("cb:{}:{}", self.namespace, self.owner.partition_suffix())
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Persisted wrapper around every payload.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    owner: OwnerId,
    saved_at: DateTime<Utc>,
    payload: T,
}

/// TTL-aware store over one persistence channel.
///
/// Cheaply cloneable; all subsystems share the same channel.
#[derive(Clone)]
pub struct LocalStore {
    channel: Arc<dyn PersistenceChannel>,
    ttl: Duration,
}

impl LocalStore {
    /// Create a store over `channel` with a TTL of `ttl_days`.
    #[must_use]
    pub fn new(channel: Arc<dyn PersistenceChannel>, ttl_days: i64) -> Self {
        Self {
            channel,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Persist `payload` under `partition`.
    ///
    /// The payload is wrapped in an envelope carrying the partition owner
    /// and the save time. Serialization failures are logged and swallowed;
    /// the previous entry, if any, is left in place.
    pub fn save<T: Serialize>(&self, partition: &PartitionKey, payload: &T) {
        let envelope = Envelope {
            owner: partition.owner(),
            saved_at: Utc::now(),
            payload,
        };
        match serde_json::to_string(&envelope) {
            Ok(raw) => {
                let expires_at = Utc::now() + self.ttl;
                self.channel.write(&partition.render(), &raw, Some(expires_at));
            }
            Err(e) => {
                tracing::warn!(partition = %partition, error = %e, "snapshot serialization failed; save skipped");
            }
        }
    }

    /// Load the payload stored under `partition`.
    ///
    /// Returns `None` when the key is missing, the payload fails to
    /// deserialize (entry purged), the entry is older than the TTL (entry
    /// purged), or the envelope's owner does not match the partition owner.
    /// Never errors.
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, partition: &PartitionKey) -> Option<T> {
        let key = partition.render();
        let raw = self.channel.read(&key)?;

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(partition = %partition, error = %e, "corrupt snapshot; treating as absent");
                self.channel.remove(&key);
                return None;
            }
        };

        if envelope.owner != partition.owner() {
            // A foreign owner tag under this key means a stale or mangled
            // entry, not someone else's live data; purge it.
            tracing::debug!(partition = %partition, found = %envelope.owner, "owner mismatch; treating as absent");
            self.channel.remove(&key);
            return None;
        }

        if Utc::now() - envelope.saved_at > self.ttl {
            tracing::debug!(partition = %partition, saved_at = %envelope.saved_at, "snapshot expired; purged");
            self.channel.remove(&key);
            return None;
        }

        Some(envelope.payload)
    }

    /// Remove the entry under `partition`, if any.
    pub fn delete(&self, partition: &PartitionKey) {
        self.channel.remove(&partition.render());
    }
}
