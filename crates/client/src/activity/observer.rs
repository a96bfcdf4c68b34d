//! Injectable search-request observer.
//!
//! The host application registers this observer with its own HTTP layer
//! and feeds it outgoing requests; when one targets the configured search
//! path, the observer records a `search` event with the query term. The
//! observer is scoped to the client's lifecycle and never intercepts
//! anything globally.

use serde_json::json;
use url::Url;

use super::{ActivityKind, ActivityLedger};

/// Query parameter carrying the search term.
const QUERY_PARAM: &str = "q";

/// Observer that derives search events from outgoing requests.
#[derive(Clone)]
pub struct SearchObserver {
    ledger: ActivityLedger,
    search_path: String,
}

impl SearchObserver {
    /// Create an observer watching requests under `search_path`.
    #[must_use]
    pub fn new(ledger: ActivityLedger, search_path: String) -> Self {
        Self {
            ledger,
            search_path,
        }
    }

    /// Feed one outgoing request to the observer.
    ///
    /// Anything that is not a GET to the search path is ignored. Tracking
    /// is consent-gated by the ledger, so this is always safe to call.
    pub fn observe(&self, method: &str, url: &str) {
        if !method.eq_ignore_ascii_case("GET") {
            return;
        }
        let Ok(parsed) = Url::parse(url) else {
            return;
        };
        if !parsed.path().starts_with(&self.search_path) {
            return;
        }
        let query = parsed
            .query_pairs()
            .find(|(key, _)| key == QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();

        self.ledger
            .track(ActivityKind::Search, json!({ "query": query }));
    }
}
