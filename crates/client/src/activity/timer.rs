//! Time-on-page accumulation.
//!
//! The host reports page visibility to the timer: `page_shown` starts or
//! resumes the visible-time clock, `page_hidden` pauses it, and `leave`
//! finalizes the visit and records one `time_on_page` event through the
//! ledger. Only visible time is counted; time spent in a hidden tab never
//! accumulates. There is no periodic poll.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use super::{ActivityKind, ActivityLedger};

struct TimerState {
    page: Option<String>,
    visible_since: Option<Instant>,
    accumulated: Duration,
}

/// Visible-time accumulator for the current page.
///
/// Cheaply cloneable; all clones share the same accumulator.
#[derive(Clone)]
pub struct PageTimer {
    ledger: ActivityLedger,
    state: Arc<Mutex<TimerState>>,
}

impl PageTimer {
    /// Create a timer recording through `ledger`.
    #[must_use]
    pub fn new(ledger: ActivityLedger) -> Self {
        Self {
            ledger,
            state: Arc::new(Mutex::new(TimerState {
                page: None,
                visible_since: None,
                accumulated: Duration::ZERO,
            })),
        }
    }

    /// The page became visible.
    ///
    /// A different page than the current one finalizes the previous visit
    /// first; the same page resumes its paused accumulator.
    pub fn page_shown(&self, page: &str) {
        let finished = {
            let mut state = lock(&self.state);
            let finished = if state.page.as_deref() == Some(page) {
                None
            } else {
                take_visit(&mut state)
            };
            if state.page.is_none() {
                state.page = Some(page.to_string());
                state.accumulated = Duration::ZERO;
            }
            if state.visible_since.is_none() {
                state.visible_since = Some(Instant::now());
            }
            finished
        };
        if let Some((page, visible)) = finished {
            self.record(&page, visible);
        }
    }

    /// The page was hidden (tab switch, minimize). Pauses the clock.
    pub fn page_hidden(&self) {
        let mut state = lock(&self.state);
        if let Some(since) = state.visible_since.take() {
            state.accumulated += since.elapsed();
        }
    }

    /// The visit ended. Records the accumulated visible time.
    pub fn leave(&self) {
        let finished = {
            let mut state = lock(&self.state);
            take_visit(&mut state)
        };
        if let Some((page, visible)) = finished {
            self.record(&page, visible);
        }
    }

    fn record(&self, page: &str, visible: Duration) {
        self.ledger.track(
            ActivityKind::TimeOnPage,
            json!({
                "page": page,
                "visible_ms": u64::try_from(visible.as_millis()).unwrap_or(u64::MAX),
            }),
        );
    }
}

/// Close out the current visit, returning its page and total visible time.
fn take_visit(state: &mut TimerState) -> Option<(String, Duration)> {
    let page = state.page.take()?;
    if let Some(since) = state.visible_since.take() {
        state.accumulated += since.elapsed();
    }
    let visible = state.accumulated;
    state.accumulated = Duration::ZERO;
    Some((page, visible))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
