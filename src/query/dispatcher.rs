use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::debounce::{CommittedSearch, SearchDebouncer};
use super::grouping::{group_by_month, MonthGroup};
use crate::config::EngineConfig;
use crate::error::{EngineError, StoreError};
use crate::facets::ranker::FacetRanking;
use crate::facets::timeline;
use crate::state::data::{
    ConversationFacet, ConversationId, FileTypeFilter, MediaRecord, MonthKey, SenderFacet,
    SenderId, SortOrder, TimelineEntry, YearBucket,
};
use crate::state::filter::FilterState;
use crate::store::{MediaStore, TimelineSource};
use crate::ui::histogram::TimelineHistogram;

/// Monotonically increasing identifier of an issued query
pub type RequestId = u64;

/// A filter snapshot sent to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub id: RequestId,
    pub filters: FilterState,
}

/// Events delivered to the dispatcher's single applier
#[derive(Debug)]
enum DispatchEvent {
    Search(CommittedSearch),
    Completed {
        request: RequestId,
        result: Result<Vec<MediaRecord>, StoreError>,
    },
}

/// What the applier did with one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchUpdate {
    /// Results of the latest request are now displayed
    Applied { request: RequestId, count: usize },
    /// A result arrived for a request that is no longer the latest
    Superseded { request: RequestId },
    /// The latest request failed; previous results are kept
    Failed { request: RequestId, reason: String },
    /// Debounced search text was committed, possibly issuing a request
    SearchCommitted {
        text: String,
        request: Option<RequestId>,
    },
    /// A debounce timer fired after being cancelled
    SearchDiscarded,
}

/// Facet collections from the last successful refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSnapshot {
    pub conversations: Vec<ConversationFacet>,
    pub senders: Vec<SenderFacet>,
    /// Canonical order, ascending by month key
    pub timeline: Vec<TimelineEntry>,
}

async fn fetch_facets<S: MediaStore>(store: &S) -> Result<FacetSnapshot, StoreError> {
    let conversations = store.get_conversations().await?;
    let senders = store.get_senders().await?;
    let timeline = match store.get_timeline_raw().await? {
        TimelineSource::Aggregated(entries) => timeline::normalize(entries),
        TimelineSource::Timestamps(stamps) => timeline::aggregate(stamps),
    };
    Ok(FacetSnapshot {
        conversations,
        senders,
        timeline,
    })
}

/// Drop selections that no longer exist in a refreshed snapshot
fn reconcile(filters: &FilterState, snapshot: &FacetSnapshot) -> FilterState {
    let mut next = filters.clone();

    if let Some(id) = next.conversation() {
        if !snapshot.conversations.iter().any(|c| c.id == id) {
            info!(conversation = id, "selected conversation no longer exists, clearing");
            next = next.select_conversation(None);
        }
    }
    if let Some(id) = next.sender() {
        if !snapshot.senders.iter().any(|s| s.id == id) {
            info!(sender = id, "selected sender no longer exists, clearing");
            next = next.select_sender(None);
        }
    }
    if let Some(month) = next.month() {
        if !snapshot.timeline.iter().any(|e| e.month_key == month) {
            info!(%month, "selected month no longer has media, clearing");
            next = next.select_month(None);
        }
    }

    next
}

/// Owner of the filter state and applier of query results.
///
/// All mutation goes through `&mut self` from one task. Store calls run
/// as spawned tasks and report back over a channel; a result is applied
/// only if it belongs to the most recently issued request, whatever order
/// the completions arrive in.
pub struct QueryDispatcher<S> {
    store: Arc<S>,
    top_n: usize,
    page_size: u32,

    filters: FilterState,
    raw_search: String,
    debouncer: SearchDebouncer<DispatchEvent>,

    events_tx: mpsc::UnboundedSender<DispatchEvent>,
    events_rx: mpsc::UnboundedReceiver<DispatchEvent>,

    next_request: RequestId,
    latest: Option<QueryRequest>,
    settled: Option<RequestId>,
    applied: Option<RequestId>,

    results: Vec<MediaRecord>,
    groups: Vec<MonthGroup>,
    last_error: Option<EngineError>,

    facets: FacetSnapshot,
}

impl<S: MediaStore> QueryDispatcher<S> {
    pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let debouncer = SearchDebouncer::with_wrapper(
            config.debounce(),
            events_tx.clone(),
            DispatchEvent::Search,
        );

        Self {
            store,
            top_n: config.top_n,
            page_size: config.page_size,
            filters: FilterState::new(),
            raw_search: String::new(),
            debouncer,
            events_tx,
            events_rx,
            next_request: 0,
            latest: None,
            settled: None,
            applied: None,
            results: Vec::new(),
            groups: Vec::new(),
            last_error: None,
            facets: FacetSnapshot::default(),
        }
    }

    // ========== Filter transitions ==========

    pub fn select_conversation(&mut self, id: Option<ConversationId>) -> Option<RequestId> {
        let next = self.filters.select_conversation(id);
        self.commit(next)
    }

    pub fn select_sender(&mut self, id: Option<SenderId>) -> Option<RequestId> {
        let next = self.filters.select_sender(id);
        self.commit(next)
    }

    pub fn set_file_type(&mut self, file_type: FileTypeFilter) -> Option<RequestId> {
        let next = self.filters.set_file_type(file_type);
        self.commit(next)
    }

    pub fn select_month(&mut self, month: Option<MonthKey>) -> Option<RequestId> {
        let next = self.filters.select_month(month);
        self.commit(next)
    }

    pub fn set_sort(&mut self, sort: SortOrder) -> Option<RequestId> {
        let next = self.filters.set_sort(sort);
        self.commit(next)
    }

    /// Clear every facet and the search text
    pub fn clear_filters(&mut self) -> Option<RequestId> {
        self.raw_search.clear();
        self.debouncer.cancel();
        let next = self.filters.clear_all();
        self.commit(next)
    }

    /// Raw keystroke-level search input; committed after the quiet period
    pub fn search_input(&mut self, text: impl Into<String>) {
        self.raw_search = text.into();
        self.debouncer.input(self.raw_search.clone());
    }

    /// Commit the raw search text now, skipping the quiet period
    pub fn submit_search(&mut self) -> Option<RequestId> {
        let next = self.filters.set_search_text(self.raw_search.clone());
        self.commit(next)
    }

    /// Issue the current filter again, for the initial load or to retry
    /// after a failure
    pub fn reload(&mut self) -> RequestId {
        self.issue()
    }

    /// A facet change cancels any pending search emission. A transition
    /// that changes nothing leaves it running.
    fn commit(&mut self, next: FilterState) -> Option<RequestId> {
        if next == self.filters {
            return None;
        }
        self.debouncer.cancel();
        self.filters = next;
        Some(self.issue())
    }

    fn issue(&mut self) -> RequestId {
        self.next_request += 1;
        let id = self.next_request;
        let request = QueryRequest {
            id,
            filters: self.filters.clone(),
        };
        let query = request.filters.to_query(self.page_size, 0);
        debug!(request = id, ?query, "issuing media query");

        let store = Arc::clone(&self.store);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = store.query_media(query).await;
            let _ = tx.send(DispatchEvent::Completed { request: id, result });
        });

        self.latest = Some(request);
        id
    }

    // ========== Event application ==========

    /// Wait for the next debounce emission or store completion and apply it
    pub async fn next_update(&mut self) -> Option<DispatchUpdate> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    /// Apply events until the latest request has been answered.
    /// Returns `None` if nothing is in flight.
    pub async fn settle(&mut self) -> Option<DispatchUpdate> {
        while self.is_loading() {
            let update = self.next_update().await?;
            if matches!(
                update,
                DispatchUpdate::Applied { .. } | DispatchUpdate::Failed { .. }
            ) {
                return Some(update);
            }
        }
        None
    }

    fn apply(&mut self, event: DispatchEvent) -> DispatchUpdate {
        match event {
            DispatchEvent::Search(committed) => {
                if !self.debouncer.accept(&committed) {
                    debug!(ticket = committed.ticket, "ignoring cancelled search emission");
                    return DispatchUpdate::SearchDiscarded;
                }
                let next = self.filters.set_search_text(committed.text.clone());
                let request = if next == self.filters {
                    None
                } else {
                    self.filters = next;
                    Some(self.issue())
                };
                DispatchUpdate::SearchCommitted {
                    text: committed.text,
                    request,
                }
            }
            DispatchEvent::Completed { request, result } => self.complete(request, result),
        }
    }

    fn complete(
        &mut self,
        request: RequestId,
        result: Result<Vec<MediaRecord>, StoreError>,
    ) -> DispatchUpdate {
        let latest = self.latest.as_ref().map(|r| r.id);
        if latest != Some(request) {
            debug!(request, ?latest, "discarding superseded query result");
            return DispatchUpdate::Superseded { request };
        }
        self.settled = Some(request);

        match result {
            Ok(records) => {
                let count = records.len();
                self.groups = group_by_month(&records);
                self.results = records;
                self.applied = Some(request);
                self.last_error = None;
                debug!(request, count, groups = self.groups.len(), "applied query result");
                DispatchUpdate::Applied { request, count }
            }
            Err(err) => {
                warn!(request, error = %err, "media query failed, keeping previous results");
                let reason = err.to_string();
                self.last_error = Some(EngineError::StoreUnavailable(err));
                DispatchUpdate::Failed { request, reason }
            }
        }
    }

    // ========== Facet refresh ==========

    /// Reload conversations, senders and the timeline from the store.
    ///
    /// Selections that no longer exist are cleared and a new query is
    /// issued for the corrected filter. On failure the previous snapshot
    /// stays in place.
    pub async fn refresh_facets(&mut self) -> Result<Option<RequestId>, EngineError> {
        let snapshot = fetch_facets(self.store.as_ref()).await?;
        info!(
            conversations = snapshot.conversations.len(),
            senders = snapshot.senders.len(),
            months = snapshot.timeline.len(),
            "facets refreshed"
        );

        let reconciled = reconcile(&self.filters, &snapshot);
        self.facets = snapshot;
        if reconciled == self.filters {
            return Ok(None);
        }
        self.filters = reconciled;
        Ok(Some(self.issue()))
    }

    // ========== Views ==========

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    /// Search text as typed, which may not be committed yet
    pub fn raw_search(&self) -> &str {
        &self.raw_search
    }

    pub fn latest_request(&self) -> Option<&QueryRequest> {
        self.latest.as_ref()
    }

    /// Request whose results are currently displayed
    pub fn applied_request(&self) -> Option<RequestId> {
        self.applied
    }

    /// Whether the latest request is still unanswered
    pub fn is_loading(&self) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|request| Some(request.id) != self.settled)
    }

    pub fn results(&self) -> &[MediaRecord] {
        &self.results
    }

    pub fn groups(&self) -> &[MonthGroup] {
        &self.groups
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Error of the latest request, cleared by the next success
    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    pub fn facets(&self) -> &FacetSnapshot {
        &self.facets
    }

    pub fn conversation_ranking(&self) -> FacetRanking<'_, ConversationFacet> {
        FacetRanking::new(&self.facets.conversations, self.top_n, self.filters.conversation())
    }

    pub fn sender_ranking(&self) -> FacetRanking<'_, SenderFacet> {
        FacetRanking::new(&self.facets.senders, self.top_n, self.filters.sender())
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.facets.timeline
    }

    pub fn year_buckets(&self) -> Vec<YearBucket> {
        timeline::year_buckets(&self.facets.timeline)
    }

    pub fn histogram(&self) -> TimelineHistogram {
        TimelineHistogram::new(&self.facets.timeline, self.filters.month())
    }
}
