use std::sync::Arc;

use tokio::sync::watch;

use crate::{contest::ContestEntry, repository::Snapshot, types::CatchType};

use super::{
    stats::{Stats, summarize},
    view::{
        ContestFilter, DEFAULT_PAGE_SIZE, PageView, catch_choices, location_choices, total_pages,
        view,
    },
};

/// Holds the latest snapshot plus the user's filter and page selection.
///
/// Stats and filter choices are recomputed once per snapshot, not per read.
#[derive(Debug, Clone)]
pub struct DashboardState {
    entries: Snapshot,
    filter: ContestFilter,
    page: usize,
    page_size: usize,
    stats: Option<Stats>,
    locations: Vec<String>,
    catches: Vec<CatchType>,
    attached: bool,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl DashboardState {
    /// Empty dashboard showing `page_size` rows per page.
    pub fn new(page_size: usize) -> Self {
        Self {
            entries: Arc::new(Vec::new()),
            filter: ContestFilter::default(),
            page: 1,
            page_size: page_size.max(1),
            stats: None,
            locations: Vec::new(),
            catches: Vec::new(),
            attached: false,
        }
    }

    /// Dashboard seeded with the snapshot currently held by `rx`.
    pub fn from_receiver(rx: &mut watch::Receiver<Snapshot>, page_size: usize) -> Self {
        let mut state = Self::new(page_size);
        state.sync(rx);
        state
    }

    /// Replaces the snapshot wholesale. Filters and the active page stay.
    pub fn replace_snapshot(&mut self, entries: Snapshot) {
        self.stats = summarize(&entries);
        self.locations = location_choices(&entries);
        self.catches = catch_choices(&entries);
        self.entries = entries;
    }

    /// Pulls the latest snapshot from `rx`. The first call always takes
    /// the current value; later calls only when it changed since. Returns
    /// whether anything was replaced.
    pub fn sync(&mut self, rx: &mut watch::Receiver<Snapshot>) -> bool {
        if self.attached && !rx.has_changed().unwrap_or(false) {
            return false;
        }
        self.attached = true;
        let latest = rx.borrow_and_update().clone();
        self.replace_snapshot(latest);
        true
    }

    /// Selects a location; an empty string clears the filter. Resets to page 1.
    pub fn set_location_filter(&mut self, location: Option<String>) {
        self.filter.location = location.filter(|l| !l.is_empty());
        self.page = 1;
    }

    /// Selects a species. Resets to page 1.
    pub fn set_catch_filter(&mut self, catch: Option<CatchType>) {
        self.filter.catch = catch;
        self.page = 1;
    }

    /// Active filter selection.
    pub fn filter(&self) -> &ContestFilter {
        &self.filter
    }

    /// Active 1-based page.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Page count for the current filter.
    pub fn total_pages(&self) -> usize {
        let count = self.entries.iter().filter(|e| self.filter.matches(e)).count();
        total_pages(count, self.page_size)
    }

    /// Moves forward one page, stopping at the last.
    pub fn next_page(&mut self) {
        self.page = (self.page + 1).min(self.total_pages());
    }

    /// Moves back one page, stopping at the first.
    pub fn previous_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Rows for the active page.
    pub fn current_page(&self) -> PageView<'_> {
        view(&self.entries, &self.filter, self.page, self.page_size)
    }

    /// Aggregate stats over the whole snapshot, ignoring filters.
    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    /// Locations offered by the location filter.
    pub fn location_choices(&self) -> &[String] {
        &self.locations
    }

    /// Species offered by the catch filter.
    pub fn catch_choices(&self) -> &[CatchType] {
        &self.catches
    }

    /// Every entry in the current snapshot.
    pub fn entries(&self) -> &[ContestEntry] {
        &self.entries
    }
}
