/// Facet filter state for the media browser
///
/// This struct is the single source of truth for what the user has
/// selected. It is an immutable value: every transition returns a new
/// state and leaves the original untouched, so the owner can compare
/// snapshots and issue a query whenever they differ.
use serde::{Deserialize, Serialize};

use super::data::{ConversationId, FileTypeFilter, MonthKey, SenderId, SortOrder};
use crate::store::MediaQuery;

/// Current facet selections, search text and sort order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FilterState {
    // ========== Facets ==========
    /// Selected source conversation
    conversation: Option<ConversationId>,

    /// Selected sender
    sender: Option<SenderId>,

    /// File-type facet; `All` means no filter
    file_type: FileTypeFilter,

    /// Selected timeline month
    month: Option<MonthKey>,

    // ========== Search & ordering ==========
    /// Committed (debounced) free-text search, possibly empty
    search: String,

    sort: SortOrder,
}

/// Selecting the value that is already selected clears the facet.
fn toggle<T: PartialEq>(current: Option<&T>, next: Option<T>) -> Option<T> {
    match next {
        Some(value) if current == Some(&value) => None,
        other => other,
    }
}

impl FilterState {
    /// Create the session-start state (no facets, newest first)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> Option<ConversationId> {
        self.conversation
    }

    pub fn sender(&self) -> Option<SenderId> {
        self.sender
    }

    pub fn file_type(&self) -> FileTypeFilter {
        self.file_type
    }

    pub fn month(&self) -> Option<MonthKey> {
        self.month
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    /// Select a conversation, or clear with `None`. Selecting the current
    /// conversation again clears it.
    #[must_use]
    pub fn select_conversation(&self, id: Option<ConversationId>) -> Self {
        Self {
            conversation: toggle(self.conversation.as_ref(), id),
            ..self.clone()
        }
    }

    /// Select a sender, or clear with `None`. Selecting the current sender
    /// again clears it.
    #[must_use]
    pub fn select_sender(&self, id: Option<SenderId>) -> Self {
        Self {
            sender: toggle(self.sender.as_ref(), id),
            ..self.clone()
        }
    }

    /// Replace the file-type facet. There is no toggle: `All` clears.
    #[must_use]
    pub fn set_file_type(&self, file_type: FileTypeFilter) -> Self {
        Self {
            file_type,
            ..self.clone()
        }
    }

    /// Select a timeline month, or clear with `None`. Selecting the current
    /// month again clears it.
    #[must_use]
    pub fn select_month(&self, month: Option<MonthKey>) -> Self {
        Self {
            month: toggle(self.month.as_ref(), month),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn set_search_text(&self, text: impl Into<String>) -> Self {
        Self {
            search: text.into(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn set_sort(&self, sort: SortOrder) -> Self {
        Self {
            sort,
            ..self.clone()
        }
    }

    /// Reset every facet and the search text, keeping the sort order
    #[must_use]
    pub fn clear_all(&self) -> Self {
        Self {
            sort: self.sort,
            ..Self::default()
        }
    }

    /// True if any facet narrows the result set.
    ///
    /// Search text is not a facet and is not considered here.
    pub fn has_active_filters(&self) -> bool {
        self.conversation.is_some()
            || self.sender.is_some()
            || self.month.is_some()
            || self.file_type != FileTypeFilter::All
    }

    /// Store query for this state
    pub fn to_query(&self, limit: u32, offset: u32) -> MediaQuery {
        let search = self.search.trim();
        MediaQuery {
            conversation_id: self.conversation,
            sender_id: self.sender,
            file_type: self.file_type.file_type(),
            month: self.month,
            search: (!search.is_empty()).then(|| search.to_string()),
            sort: self.sort,
            limit,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::FileType;
    use proptest::prelude::*;

    fn month(key: &str) -> MonthKey {
        key.parse().unwrap()
    }

    #[test]
    fn test_default_has_no_active_filters() {
        let state = FilterState::new();
        assert!(!state.has_active_filters());
        assert_eq!(state.sort(), SortOrder::DateDesc);
        assert_eq!(state.file_type(), FileTypeFilter::All);
        assert_eq!(state.search(), "");
    }

    #[test]
    fn test_transitions_do_not_mutate_original() {
        let state = FilterState::new();
        let next = state.select_conversation(Some(7));
        assert_eq!(state.conversation(), None);
        assert_eq!(next.conversation(), Some(7));
    }

    #[test]
    fn test_selecting_new_value_replaces() {
        let state = FilterState::new().select_sender(Some(1)).select_sender(Some(2));
        assert_eq!(state.sender(), Some(2));
    }

    #[test]
    fn test_double_toggle_restores_prior_state() {
        let base = FilterState::new()
            .set_file_type(FileTypeFilter::Gif)
            .set_search_text("beach");

        let conv = base.select_conversation(Some(3)).select_conversation(Some(3));
        assert_eq!(conv, base);

        let sender = base.select_sender(Some(9)).select_sender(Some(9));
        assert_eq!(sender, base);

        let m = base.select_month(Some(month("2024-03"))).select_month(Some(month("2024-03")));
        assert_eq!(m, base);
    }

    #[test]
    fn test_none_clears_facet() {
        let state = FilterState::new().select_month(Some(month("2023-01")));
        assert_eq!(state.select_month(None).month(), None);
        // Clearing an already empty facet is a no-op
        assert_eq!(FilterState::new().select_sender(None), FilterState::new());
    }

    #[test]
    fn test_file_type_has_no_toggle() {
        let state = FilterState::new()
            .set_file_type(FileTypeFilter::Video)
            .set_file_type(FileTypeFilter::Video);
        assert_eq!(state.file_type(), FileTypeFilter::Video);
        assert!(state.has_active_filters());
        assert!(!state.set_file_type(FileTypeFilter::All).has_active_filters());
    }

    #[test]
    fn test_search_is_not_an_active_filter() {
        let state = FilterState::new().set_search_text("alex");
        assert!(!state.has_active_filters());
    }

    #[test]
    fn test_clear_all_keeps_sort() {
        let state = FilterState::new()
            .select_conversation(Some(1))
            .select_sender(Some(2))
            .select_month(Some(month("2022-06")))
            .set_file_type(FileTypeFilter::Image)
            .set_search_text("cake")
            .set_sort(SortOrder::Sender);

        let cleared = state.clear_all();
        assert!(!cleared.has_active_filters());
        assert_eq!(cleared.search(), "");
        assert_eq!(cleared.sort(), SortOrder::Sender);
    }

    #[test]
    fn test_to_query_maps_sentinels_to_none() {
        let query = FilterState::new().set_search_text("   ").to_query(500, 0);
        assert_eq!(query.file_type, None);
        assert_eq!(query.search, None);

        let query = FilterState::new()
            .select_conversation(Some(7))
            .set_file_type(FileTypeFilter::Video)
            .set_search_text(" ale ")
            .to_query(50, 100);
        assert_eq!(query.conversation_id, Some(7));
        assert_eq!(query.file_type, Some(FileType::Video));
        assert_eq!(query.search.as_deref(), Some("ale"));
        assert_eq!((query.limit, query.offset), (50, 100));
    }

    #[test]
    fn test_serialization() {
        let state = FilterState::new()
            .select_month(Some(month("2024-04")))
            .set_sort(SortOrder::DateAsc);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"2024-04\""));
        assert!(json.contains("\"date-asc\""));

        let restored: FilterState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, restored);
    }

    fn arb_file_type() -> impl Strategy<Value = FileTypeFilter> {
        prop_oneof![
            Just(FileTypeFilter::All),
            Just(FileTypeFilter::Image),
            Just(FileTypeFilter::Video),
            Just(FileTypeFilter::Gif),
        ]
    }

    fn arb_sort() -> impl Strategy<Value = SortOrder> {
        prop_oneof![
            Just(SortOrder::DateDesc),
            Just(SortOrder::DateAsc),
            Just(SortOrder::Sender),
        ]
    }

    fn arb_month() -> impl Strategy<Value = MonthKey> {
        (1970i32..2100, 1u32..=12).prop_map(|(year, month)| MonthKey::new(year, month).unwrap())
    }

    fn arb_state() -> impl Strategy<Value = FilterState> {
        (
            proptest::option::of(0i64..20),
            proptest::option::of(0i64..20),
            arb_file_type(),
            proptest::option::of(arb_month()),
            "[a-z ]{0,8}",
            arb_sort(),
        )
            .prop_map(|(conversation, sender, file_type, month, search, sort)| {
                FilterState::new()
                    .select_conversation(conversation)
                    .select_sender(sender)
                    .set_file_type(file_type)
                    .select_month(month)
                    .set_search_text(search)
                    .set_sort(sort)
            })
    }

    proptest! {
        // Prior selection is either empty or the toggled value itself
        #[test]
        fn double_toggle_restores_state(
            base in arb_state(),
            id in 0i64..20,
            key in arb_month(),
            preselect in any::<bool>(),
        ) {
            let prior = base.select_conversation(None);
            let prior = if preselect { prior.select_conversation(Some(id)) } else { prior };
            let toggled = prior.select_conversation(Some(id)).select_conversation(Some(id));
            prop_assert_eq!(&toggled, &prior);

            let prior = base.select_sender(None);
            let prior = if preselect { prior.select_sender(Some(id)) } else { prior };
            let toggled = prior.select_sender(Some(id)).select_sender(Some(id));
            prop_assert_eq!(&toggled, &prior);

            let prior = base.select_month(None);
            let prior = if preselect { prior.select_month(Some(key)) } else { prior };
            let toggled = prior.select_month(Some(key)).select_month(Some(key));
            prop_assert_eq!(&toggled, &prior);
        }

        #[test]
        fn search_never_counts_as_active(base in arb_state(), text in "[a-z]{1,8}") {
            prop_assert_eq!(
                base.set_search_text(text).has_active_filters(),
                base.has_active_filters()
            );
        }
    }
}
