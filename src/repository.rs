//! Seam between the entry builder and whatever stores contests.

use std::{future::Future, sync::Arc};

use tokio::sync::watch;

use crate::{
    contest::{ContestEntry, NewContest},
    types::EntryId,
};

/// Full list of entries at one point in time, date descending.
///
/// Each delivered snapshot replaces the previous one; consumers never merge.
pub type Snapshot = Arc<Vec<ContestEntry>>;

/// Reactive contest store.
pub trait ContestRepository {
    /// Failure reported by [`ContestRepository::append`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Appends a normalized contest; the repository stamps its id and
    /// creation time.
    fn append(
        &self,
        contest: NewContest,
    ) -> impl Future<Output = Result<EntryId, Self::Error>> + Send;

    /// Live view of all entries, updated on every change.
    fn watch_entries(&self) -> watch::Receiver<Snapshot>;
}
