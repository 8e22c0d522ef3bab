//! In-memory authoritative store.

/// Append-only contest store.
pub mod store;
