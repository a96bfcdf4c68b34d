//! Consent-gated activity ledger with read-time insights.
//!
//! Two bounded, append-only ledgers record interaction events: a
//! session-scoped one (most recent 50) and a persistent one (most recent
//! 100, stored through the local store). Appends are refused silently
//! unless the consent gate permits the event's category, and events
//! skipped while consent was denied are never backfilled. Insights are
//! derived on demand; nothing is precomputed or stored.

pub mod observer;
pub mod timer;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cloudberry_core::{SessionId, UserId};

use crate::consent::{ConsentCategory, ConsentGate};
use crate::session::SessionIdentity;
use crate::store::{LocalStore, PartitionKey};

pub use observer::SearchObserver;
pub use timer::PageTimer;

/// Capacity of the session-scoped ledger.
pub const SESSION_LEDGER_CAPACITY: usize = 50;

/// Capacity of the persistent ledger.
pub const PERSISTENT_LEDGER_CAPACITY: usize = 100;

/// How many pages the "most visited" insight reports.
const MOST_VISITED_LIMIT: usize = 5;

/// Kind of a recorded interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    View,
    Search,
    PageView,
    TimeOnPage,
    AddToCart,
    RemoveFromCart,
    Favorite,
    Unfavorite,
    Purchase,
    Custom(String),
}

impl ActivityKind {
    /// The consent category gating this kind.
    ///
    /// Everything the ledger records is behavioral tracking, so every kind
    /// maps to analytics consent.
    #[must_use]
    pub const fn category(&self) -> ConsentCategory {
        ConsentCategory::Analytics
    }

    /// Whether this kind counts toward the engagement score.
    #[must_use]
    pub const fn is_engagement(&self) -> bool {
        matches!(
            self,
            Self::View | Self::Search | Self::PageView | Self::TimeOnPage
        )
    }
}

/// One recorded interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
    pub user_id: Option<UserId>,
}

/// Derived analytics, computed at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insights {
    /// Share of engagement events, 0..=100. Zero when the ledger is empty.
    pub engagement_score: u8,
    /// Page-visit counters, descending, top five.
    pub most_visited: Vec<(String, u32)>,
    /// Total events in the persistent ledger.
    pub total_events: usize,
}

struct LedgerInner {
    session: VecDeque<ActivityEvent>,
    persistent: VecDeque<ActivityEvent>,
}

/// The bounded, consent-gated activity ledger.
///
/// Cheaply cloneable; all clones share the same ledgers.
#[derive(Clone)]
pub struct ActivityLedger {
    inner: Arc<Mutex<LedgerInner>>,
    store: LocalStore,
    consent: ConsentGate,
    identity: SessionIdentity,
}

impl ActivityLedger {
    /// Create a ledger, restoring the persistent half from the store.
    #[must_use]
    pub fn new(store: LocalStore, consent: ConsentGate, identity: SessionIdentity) -> Self {
        let persistent: VecDeque<ActivityEvent> = store
            .load::<Vec<ActivityEvent>>(&PartitionKey::activity())
            .map(VecDeque::from)
            .unwrap_or_default();
        Self {
            inner: Arc::new(Mutex::new(LedgerInner {
                session: VecDeque::new(),
                persistent,
            })),
            store,
            consent,
            identity,
        }
    }

    /// Record an interaction event.
    ///
    /// Silently refused when the consent gate denies the event's category.
    /// Oldest entries are evicted once a ledger exceeds its capacity.
    pub fn track(&self, kind: ActivityKind, payload: serde_json::Value) {
        if !self.consent.allows(kind.category()) {
            tracing::debug!(?kind, "activity refused; consent not granted");
            return;
        }

        let event = ActivityEvent {
            kind,
            payload,
            timestamp: Utc::now(),
            session_id: self.identity.session_id(),
            user_id: self.identity.current_user(),
        };

        let snapshot: Vec<ActivityEvent> = {
            let mut inner = lock(&self.inner);
            push_bounded(&mut inner.session, event.clone(), SESSION_LEDGER_CAPACITY);
            push_bounded(&mut inner.persistent, event, PERSISTENT_LEDGER_CAPACITY);
            inner.persistent.iter().cloned().collect()
        };
        self.store.save(&PartitionKey::activity(), &snapshot);
    }

    /// Compute insights over the persistent ledger.
    #[must_use]
    pub fn insights(&self) -> Insights {
        let inner = lock(&self.inner);
        let total_events = inner.persistent.len();

        let engagement = inner
            .persistent
            .iter()
            .filter(|event| event.kind.is_engagement())
            .count();

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        // Ledger length is bounded at 100, far inside f64 precision.
        let engagement_score = if total_events == 0 {
            0
        } else {
            let ratio = engagement as f64 / total_events as f64;
            (ratio * 100.0).round().clamp(0.0, 100.0) as u8
        };

        let mut visits: HashMap<String, u32> = HashMap::new();
        for event in &inner.persistent {
            if event.kind == ActivityKind::PageView {
                if let Some(page) = event.payload.get("page").and_then(|v| v.as_str()) {
                    *visits.entry(page.to_string()).or_insert(0) += 1;
                }
            }
        }
        let mut most_visited: Vec<(String, u32)> = visits.into_iter().collect();
        most_visited.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_visited.truncate(MOST_VISITED_LIMIT);

        Insights {
            engagement_score,
            most_visited,
            total_events,
        }
    }

    /// Number of events in the session ledger.
    #[must_use]
    pub fn session_len(&self) -> usize {
        lock(&self.inner).session.len()
    }

    /// Number of events in the persistent ledger.
    #[must_use]
    pub fn persistent_len(&self) -> usize {
        lock(&self.inner).persistent.len()
    }
}

/// Append with FIFO eviction at `capacity`.
fn push_bounded(ledger: &mut VecDeque<ActivityEvent>, event: ActivityEvent, capacity: usize) {
    ledger.push_back(event);
    while ledger.len() > capacity {
        ledger.pop_front();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
