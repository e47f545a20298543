use crate::state::data::{ConversationFacet, ConversationKind, SenderFacet};

/// Default size of a facet's top slice
pub const DEFAULT_TOP_N: usize = 5;

/// A selectable facet value with a usage count
pub trait Facet {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
    fn usage_count(&self) -> u64;
}

impl Facet for ConversationFacet {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn usage_count(&self) -> u64 {
        self.usage_count
    }
}

impl Facet for SenderFacet {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn usage_count(&self) -> u64 {
        self.usage_count
    }
}

/// Usage-ranked view over a facet collection.
///
/// Everything beyond the sorted order is derived on demand, so the top
/// slice, pinning and "browse all" answers can never disagree.
#[derive(Debug, Clone)]
pub struct FacetRanking<'a, T> {
    ranked: Vec<&'a T>,
    top_n: usize,
    selected: Option<i64>,
}

impl<'a, T: Facet> FacetRanking<'a, T> {
    pub fn new(items: &'a [T], top_n: usize, selected: Option<i64>) -> Self {
        let mut ranked: Vec<&T> = items.iter().collect();
        // Stable sort keeps the original order among equal counts
        ranked.sort_by(|a, b| b.usage_count().cmp(&a.usage_count()));
        Self {
            ranked,
            top_n,
            selected,
        }
    }

    /// Full collection, most used first
    pub fn ranked(&self) -> &[&'a T] {
        &self.ranked
    }

    pub fn top(&self) -> &[&'a T] {
        &self.ranked[..self.top_n.min(self.ranked.len())]
    }

    /// Whether there are entries beyond the top slice
    pub fn needs_browse_all(&self) -> bool {
        self.ranked.len() > self.top_n
    }

    /// The selected entity when it is known but outside the top slice
    pub fn pinned(&self) -> Option<&'a T> {
        let selected = self.selected?;
        if self.top().iter().any(|item| item.id() == selected) {
            return None;
        }
        self.ranked.iter().copied().find(|item| item.id() == selected)
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned().is_some()
    }

    /// Whether the selection refers to an entity in this collection
    pub fn selection_known(&self) -> bool {
        match self.selected {
            Some(id) => self.ranked.iter().any(|item| item.id() == id),
            None => true,
        }
    }
}

impl<'a> FacetRanking<'a, ConversationFacet> {
    /// Group chats in ranked order
    pub fn groups(&self) -> impl Iterator<Item = &'a ConversationFacet> + '_ {
        self.ranked
            .iter()
            .copied()
            .filter(|c| c.kind == ConversationKind::Group)
    }

    /// Direct message threads in ranked order
    pub fn directs(&self) -> impl Iterator<Item = &'a ConversationFacet> + '_ {
        self.ranked
            .iter()
            .copied()
            .filter(|c| c.kind == ConversationKind::Direct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sender(id: i64, usage_count: u64) -> SenderFacet {
        SenderFacet {
            id,
            name: format!("sender-{id}"),
            usage_count,
        }
    }

    fn ids<T: Facet>(items: &[&T]) -> Vec<i64> {
        items.iter().map(|i| i.id()).collect()
    }

    #[test]
    fn test_sorted_by_usage_with_stable_ties() {
        let senders = vec![sender(1, 3), sender(2, 9), sender(3, 3), sender(4, 12), sender(5, 3)];
        let ranking = FacetRanking::new(&senders, 5, None);
        assert_eq!(ids(ranking.ranked()), vec![4, 2, 1, 3, 5]);
    }

    #[test]
    fn test_small_collection_needs_no_browse_all() {
        let senders = vec![sender(1, 1), sender(2, 5), sender(3, 2)];
        let ranking = FacetRanking::new(&senders, DEFAULT_TOP_N, Some(1));
        assert!(!ranking.needs_browse_all());
        assert_eq!(ids(ranking.top()), ids(ranking.ranked()));
        assert!(!ranking.is_pinned());
        assert!(ranking.pinned().is_none());
    }

    #[test]
    fn test_selection_outside_top_is_pinned() {
        let senders: Vec<SenderFacet> = (1..=8).map(|id| sender(id, 100 - id as u64)).collect();
        let ranking = FacetRanking::new(&senders, 5, Some(7));

        assert!(ranking.needs_browse_all());
        assert_eq!(ids(ranking.top()), vec![1, 2, 3, 4, 5]);
        assert!(ranking.is_pinned());
        assert_eq!(ranking.pinned().map(|s| s.id), Some(7));
    }

    #[test]
    fn test_selection_inside_top_is_not_pinned() {
        let senders: Vec<SenderFacet> = (1..=8).map(|id| sender(id, 100 - id as u64)).collect();
        let ranking = FacetRanking::new(&senders, 5, Some(3));
        assert!(!ranking.is_pinned());
    }

    #[test]
    fn test_unknown_selection() {
        let senders = vec![sender(1, 1)];
        let ranking = FacetRanking::new(&senders, 5, Some(42));
        assert!(!ranking.is_pinned());
        assert!(!ranking.selection_known());
    }

    #[test]
    fn test_empty_collection() {
        let senders: Vec<SenderFacet> = Vec::new();
        let ranking = FacetRanking::new(&senders, 5, None);
        assert!(ranking.top().is_empty());
        assert!(!ranking.needs_browse_all());
        assert!(ranking.selection_known());
    }

    #[test]
    fn test_conversation_partitions() {
        let conversation = |id, name: &str, kind, usage_count| ConversationFacet {
            id,
            name: name.to_string(),
            kind,
            usage_count,
        };
        let conversations = vec![
            conversation(1, "Family", ConversationKind::Group, 4),
            conversation(2, "Bea", ConversationKind::Direct, 9),
            conversation(3, "Team", ConversationKind::Group, 6),
        ];
        let ranking = FacetRanking::new(&conversations, 5, None);
        assert_eq!(ranking.groups().map(|c| c.id).collect::<Vec<_>>(), vec![3, 1]);
        assert_eq!(ranking.directs().map(|c| c.id).collect::<Vec<_>>(), vec![2]);
    }

    proptest! {
        #[test]
        fn small_collections_need_no_browse_all(
            counts in prop::collection::vec(0u64..50, 0..12),
            top_n in 1usize..8,
        ) {
            let senders: Vec<SenderFacet> = counts
                .iter()
                .enumerate()
                .map(|(i, count)| sender(i as i64, *count))
                .collect();
            let ranking = FacetRanking::new(&senders, top_n, None);

            prop_assert_eq!(ranking.needs_browse_all(), senders.len() > top_n);
            if senders.len() <= top_n {
                prop_assert_eq!(ids(ranking.top()), ids(ranking.ranked()));
            }
            prop_assert!(ranking
                .ranked()
                .windows(2)
                .all(|w| w[0].usage_count >= w[1].usage_count));
        }

        #[test]
        fn selection_outside_top_is_pinned(
            counts in prop::collection::vec(0u64..50, 1..12),
            top_n in 1usize..8,
            pick in any::<prop::sample::Index>(),
        ) {
            let senders: Vec<SenderFacet> = counts
                .iter()
                .enumerate()
                .map(|(i, count)| sender(i as i64, *count))
                .collect();
            let selected = pick.get(&senders).id;
            let ranking = FacetRanking::new(&senders, top_n, Some(selected));

            let position = ranking
                .ranked()
                .iter()
                .position(|s| s.id == selected)
                .unwrap();
            prop_assert_eq!(ranking.is_pinned(), position >= top_n);
            if position >= top_n {
                prop_assert_eq!(ranking.pinned().map(|s| s.id), Some(selected));
            }
            prop_assert!(ranking.selection_known());
        }
    }
}
