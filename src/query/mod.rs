/// Query pipeline
///
/// This module turns filter changes into store queries:
/// - Trailing-edge search debounce (debounce.rs)
/// - Request issue, supersession and result application (dispatcher.rs)
/// - Month grouping of results for display (grouping.rs)
pub mod debounce;
pub mod dispatcher;
pub mod grouping;
