//! Facet, timeline and query engine for browsing chat-exported media.
//!
//! The [`QueryDispatcher`](query::dispatcher::QueryDispatcher) owns the
//! current [`FilterState`](state::filter::FilterState), turns every change
//! into a store query and applies only the latest answer. Facet rankings
//! and the month timeline are derived from store snapshots.

pub mod config;
pub mod error;
pub mod facets;
pub mod query;
pub mod state;
pub mod store;
pub mod ui;

pub use config::EngineConfig;
pub use error::{EngineError, StoreError};
pub use query::dispatcher::{DispatchUpdate, QueryDispatcher, QueryRequest, RequestId};
pub use state::data::{
    ConversationFacet, ConversationKind, FileType, FileTypeFilter, MediaRecord, MonthKey,
    SenderFacet, SortOrder, TimelineEntry, YearBucket,
};
pub use state::filter::FilterState;
pub use state::library::Library;
pub use store::{MediaQuery, MediaStore, MemoryStore, TimelineSource};
