//! Read-side derivations over a snapshot of contests.

/// Filter selection, paging and memoized derivations for the dashboard.
pub mod dashboard;
/// Aggregate statistics.
pub mod stats;
/// Filtering and pagination.
pub mod view;
