//! Contract with the media store collaborator.
//!
//! The engine never filters or sorts media itself; it hands a
//! [`MediaQuery`] to a [`MediaStore`] and trusts the order it gets back.

use std::future::Future;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::state::data::{
    ConversationFacet, ConversationId, ConversationKind, FileType, MediaRecord, MonthKey,
    SenderFacet, SenderId, SortOrder, TimelineEntry,
};

/// Filter record sent to the store. `None` means "do not filter".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    pub conversation_id: Option<ConversationId>,
    pub sender_id: Option<SenderId>,
    pub file_type: Option<FileType>,
    pub month: Option<MonthKey>,
    pub search: Option<String>,
    pub sort: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

/// Timeline data as the store chooses to provide it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineSource {
    /// Already grouped per month
    Aggregated(Vec<TimelineEntry>),
    /// One epoch-millis timestamp per media record
    Timestamps(Vec<i64>),
}

/// Asynchronous access to the persisted media archive.
///
/// Implementations manage their own concurrency; the engine only issues
/// request/response calls and may have several queries in flight.
pub trait MediaStore: Send + Sync + 'static {
    fn get_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<ConversationFacet>, StoreError>> + Send;

    fn get_senders(&self) -> impl Future<Output = Result<Vec<SenderFacet>, StoreError>> + Send;

    fn get_timeline_raw(&self) -> impl Future<Output = Result<TimelineSource, StoreError>> + Send;

    fn query_media(
        &self,
        query: MediaQuery,
    ) -> impl Future<Output = Result<Vec<MediaRecord>, StoreError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryInner {
    conversations: Vec<(ConversationId, String, ConversationKind)>,
    records: Vec<MediaRecord>,
    unavailable: bool,
}

/// Store backed by an in-memory record list.
///
/// Filtering mirrors the SQLite catalog except that search only looks at
/// sender and conversation names. The timeline is returned as raw
/// timestamps so the engine aggregates it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn add_conversation(
        &self,
        id: ConversationId,
        name: &str,
        kind: ConversationKind,
    ) -> Result<(), StoreError> {
        self.lock()?.conversations.push((id, name.to_string(), kind));
        Ok(())
    }

    pub fn add_record(&self, record: MediaRecord) -> Result<(), StoreError> {
        self.lock()?.records.push(record);
        Ok(())
    }

    /// Drop every conversation and record
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.conversations.clear();
        inner.records.clear();
        Ok(())
    }

    /// Make every subsequent call fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), StoreError> {
        self.lock()?.unavailable = unavailable;
        Ok(())
    }

    fn available(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        let inner = self.lock()?;
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(inner)
    }

    fn matches(record: &MediaRecord, query: &MediaQuery) -> bool {
        if query.conversation_id.is_some_and(|id| record.conversation_id != id) {
            return false;
        }
        if query.sender_id.is_some_and(|id| record.sender_id != id) {
            return false;
        }
        if query.file_type.is_some_and(|ft| record.file_type != ft) {
            return false;
        }
        if query.month.is_some() && record.month_key() != query.month {
            return false;
        }
        if let Some(search) = &query.search {
            let needle = search.to_lowercase();
            return record.sender_name.to_lowercase().contains(&needle)
                || record.conversation_name.to_lowercase().contains(&needle);
        }
        true
    }
}

impl MediaStore for MemoryStore {
    async fn get_conversations(&self) -> Result<Vec<ConversationFacet>, StoreError> {
        let inner = self.available()?;
        let mut facets: Vec<ConversationFacet> = inner
            .conversations
            .iter()
            .map(|(id, name, kind)| ConversationFacet {
                id: *id,
                name: name.clone(),
                kind: *kind,
                usage_count: inner
                    .records
                    .iter()
                    .filter(|r| r.conversation_id == *id)
                    .count() as u64,
            })
            .collect();
        facets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(facets)
    }

    async fn get_senders(&self) -> Result<Vec<SenderFacet>, StoreError> {
        let inner = self.available()?;
        let mut senders: Vec<SenderFacet> = Vec::new();
        for record in &inner.records {
            match senders.iter_mut().find(|s| s.id == record.sender_id) {
                Some(sender) => sender.usage_count += 1,
                None => senders.push(SenderFacet {
                    id: record.sender_id,
                    name: record.sender_name.clone(),
                    usage_count: 1,
                }),
            }
        }
        senders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(senders)
    }

    async fn get_timeline_raw(&self) -> Result<TimelineSource, StoreError> {
        let inner = self.available()?;
        Ok(TimelineSource::Timestamps(
            inner.records.iter().map(|r| r.timestamp_ms).collect(),
        ))
    }

    async fn query_media(&self, query: MediaQuery) -> Result<Vec<MediaRecord>, StoreError> {
        let inner = self.available()?;
        let mut result: Vec<MediaRecord> = inner
            .records
            .iter()
            .filter(|r| Self::matches(r, &query))
            .cloned()
            .collect();

        match query.sort {
            SortOrder::DateAsc => result.sort_by_key(|r| r.timestamp_ms),
            SortOrder::DateDesc => result.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms)),
            SortOrder::Sender => result.sort_by(|a, b| {
                a.sender_name
                    .cmp(&b.sender_name)
                    .then(b.timestamp_ms.cmp(&a.timestamp_ms))
            }),
        }

        Ok(result
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::filter::FilterState;

    fn record(
        id: i64,
        conversation_id: i64,
        sender: (i64, &str),
        timestamp_ms: i64,
    ) -> MediaRecord {
        MediaRecord {
            id,
            conversation_id,
            sender_id: sender.0,
            timestamp_ms,
            file_type: FileType::Image,
            locator: format!("/media/{id}.jpg"),
            sender_name: sender.1.to_string(),
            conversation_name: format!("chat {conversation_id}"),
        }
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_conversation(1, "Family", ConversationKind::Group).unwrap();
        store.add_conversation(2, "Bea", ConversationKind::Direct).unwrap();
        store.add_record(record(1, 1, (10, "Zoe"), 1_000)).unwrap();
        store.add_record(record(2, 1, (11, "Adam"), 3_000)).unwrap();
        store.add_record(record(3, 2, (10, "Zoe"), 2_000)).unwrap();
        store
    }

    #[tokio::test]
    async fn test_sort_orders() {
        let store = store();
        let ids = |records: Vec<MediaRecord>| records.iter().map(|r| r.id).collect::<Vec<_>>();

        let asc = FilterState::new().set_sort(SortOrder::DateAsc).to_query(10, 0);
        assert_eq!(ids(store.query_media(asc).await.unwrap()), vec![1, 3, 2]);

        let desc = FilterState::new().to_query(10, 0);
        assert_eq!(ids(store.query_media(desc).await.unwrap()), vec![2, 3, 1]);

        let by_sender = FilterState::new().set_sort(SortOrder::Sender).to_query(10, 0);
        assert_eq!(ids(store.query_media(by_sender).await.unwrap()), vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_usage_counts() {
        let store = store();
        let conversations = store.get_conversations().await.unwrap();
        assert_eq!(conversations[0].name, "Bea");
        assert_eq!(conversations[0].usage_count, 1);
        assert_eq!(conversations[1].usage_count, 2);

        let senders = store.get_senders().await.unwrap();
        assert_eq!(senders.len(), 2);
        assert_eq!((senders[1].name.as_str(), senders[1].usage_count), ("Zoe", 2));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = store();
        store.set_unavailable(true).unwrap();
        let err = store.get_senders().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
