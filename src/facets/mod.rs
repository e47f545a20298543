/// Facet derivations
///
/// This module turns store snapshots into browsable facet views:
/// - Month/year timeline aggregation (timeline.rs)
/// - Usage ranking with top-N slices and pinning (ranker.rs)
pub mod ranker;
pub mod timeline;
