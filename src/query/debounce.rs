use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default quiet period before typed search text is committed
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// A search string that survived its quiet period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedSearch {
    /// Identifies the scheduled emission this value came from
    pub ticket: u64,
    pub text: String,
}

/// Trailing-edge debounce for search input.
///
/// Each call to [`input`](Self::input) cancels the pending emission and
/// schedules a new one carrying exactly the text typed. Emissions are sent
/// on the channel given at construction, wrapped by `wrap`, so they can be
/// merged into the owner's event stream. Dropping the debouncer cancels
/// whatever is pending.
///
/// A timer may fire in the same instant it is cancelled, so the receiver
/// should confirm each value with [`accept`](Self::accept) before using it.
pub struct SearchDebouncer<E = CommittedSearch> {
    delay: Duration,
    tx: mpsc::UnboundedSender<E>,
    wrap: fn(CommittedSearch) -> E,
    pending: Option<(u64, CancellationToken)>,
    next_ticket: u64,
}

impl SearchDebouncer<CommittedSearch> {
    pub fn new(delay: Duration, tx: mpsc::UnboundedSender<CommittedSearch>) -> Self {
        Self::with_wrapper(delay, tx, std::convert::identity)
    }
}

impl<E: Send + 'static> SearchDebouncer<E> {
    pub fn with_wrapper(
        delay: Duration,
        tx: mpsc::UnboundedSender<E>,
        wrap: fn(CommittedSearch) -> E,
    ) -> Self {
        Self {
            delay,
            tx,
            wrap,
            pending: None,
            next_ticket: 0,
        }
    }

    /// Record a raw input change and restart the timer
    pub fn input(&mut self, text: impl Into<String>) {
        self.cancel();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();
        let wrap = self.wrap;
        let delay = self.delay;
        let text = text.into();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {
                    trace!(ticket, "search debounce cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    trace!(ticket, %text, "search debounce fired");
                    let _ = tx.send(wrap(CommittedSearch { ticket, text }));
                }
            }
        });

        self.pending = Some((ticket, token));
    }

    /// Cancel the pending emission, if any
    pub fn cancel(&mut self) {
        if let Some((_, token)) = self.pending.take() {
            token.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Confirm that `committed` is the live emission and retire it.
    /// Returns false for values from cancelled or replaced timers.
    pub fn accept(&mut self, committed: &CommittedSearch) -> bool {
        match &self.pending {
            Some((ticket, _)) if *ticket == committed.ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl<E> Drop for SearchDebouncer<E> {
    fn drop(&mut self) {
        if let Some((_, token)) = self.pending.take() {
            token.cancel();
        }
    }
}
