/// State management module
///
/// This module handles all engine state, including:
/// - The SQLite media catalog (library.rs)
/// - Shared data structures (data.rs)
/// - Facet filter state and its transitions (filter.rs)
pub mod data;
pub mod filter;
pub mod library;
