/// State management module
///
/// This module handles the registry and everything that reads it:
/// - Database connection and record storage (library.rs)
/// - The per-invocation in-memory mirror (cache.rs)
/// - Shared data structures (data.rs)
/// - Batch attribute edits (edit.rs)
/// - Duplicate prevention before inserts (dedup.rs)
/// - Field filters and ordering (filter.rs)

pub mod cache;
pub mod data;
pub mod dedup;
pub mod edit;
pub mod filter;
pub mod library;
