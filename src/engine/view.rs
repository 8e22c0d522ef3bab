use std::collections::BTreeSet;

use crate::{contest::ContestEntry, types::CatchType};

/// Rows per dashboard page.
pub const DEFAULT_PAGE_SIZE: usize = 6;

/// Dashboard filter selection. Both predicates must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContestFilter {
    /// Exact location to keep; `None` keeps every location.
    pub location: Option<String>,
    /// Species that must appear among the catches; `None` keeps all.
    pub catch: Option<CatchType>,
}

impl ContestFilter {
    /// True when `entry` passes both predicates.
    pub fn matches(&self, entry: &ContestEntry) -> bool {
        let location_ok = self
            .location
            .as_deref()
            .is_none_or(|loc| loc.is_empty() || entry.location == loc);
        let catch_ok = self.catch.is_none_or(|c| entry.has_catch(c));
        location_ok && catch_ok
    }
}

/// One page of filtered entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<'a> {
    /// Entries on the requested page, in snapshot order.
    pub items: Vec<&'a ContestEntry>,
    /// Number of pages for the filtered list, never below 1.
    pub total_pages: usize,
    /// Number of entries passing the filter.
    pub filtered_count: usize,
}

/// Filters `entries` and slices out the 1-based `page`.
///
/// Pages past the end yield no items; clamping is left to the caller.
/// A `page_size` of 0 is treated as 1.
pub fn view<'a>(
    entries: &'a [ContestEntry],
    filter: &ContestFilter,
    page: usize,
    page_size: usize,
) -> PageView<'a> {
    let page_size = page_size.max(1);
    let filtered: Vec<&ContestEntry> = entries.iter().filter(|e| filter.matches(e)).collect();
    let start = page.saturating_sub(1).saturating_mul(page_size);

    PageView {
        total_pages: total_pages(filtered.len(), page_size),
        filtered_count: filtered.len(),
        items: filtered.into_iter().skip(start).take(page_size).collect(),
    }
}

/// `max(1, ceil(count / page_size))`.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

/// Distinct locations, sorted.
///
/// A blank location is listed too, first; choosing it clears the filter.
pub fn location_choices(entries: &[ContestEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.location.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Distinct species caught across `entries`, sorted by label.
pub fn catch_choices(entries: &[ContestEntry]) -> Vec<CatchType> {
    let labels: BTreeSet<&'static str> = entries
        .iter()
        .flat_map(|e| e.catches.iter().map(|c| c.as_str()))
        .collect();
    labels
        .into_iter()
        .filter_map(|label| label.parse().ok())
        .collect()
}
