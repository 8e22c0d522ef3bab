use hashbrown::HashMap;
use serde::Serialize;

use crate::contest::ContestEntry;

/// Summary of every recorded contest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Mean total weight in grams.
    pub average_weight: f64,
    /// Most frequent non-empty location; ties go to the one seen first.
    pub favorite_location: Option<String>,
    /// Share of wins, rounded to a whole percent.
    pub win_rate: u8,
}

/// Computes [`Stats`] over `entries`, or `None` when there are none.
///
/// Iteration follows the slice order, which makes the favorite location
/// tie-break deterministic for a given snapshot.
pub fn summarize(entries: &[ContestEntry]) -> Option<Stats> {
    if entries.is_empty() {
        return None;
    }
    let count = entries.len() as f64;

    let total_weight: f64 = entries.iter().map(|e| e.total_weight).sum();
    let wins = entries.iter().filter(|e| e.is_win()).count() as f64;

    Some(Stats {
        average_weight: total_weight / count,
        favorite_location: favorite_location(entries),
        win_rate: (100.0 * wins / count).round() as u8,
    })
}

fn favorite_location(entries: &[ContestEntry]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for entry in entries {
        if entry.location.is_empty() {
            continue;
        }
        let n = counts.entry(entry.location.as_str()).or_insert(0);
        if *n == 0 {
            first_seen.push(entry.location.as_str());
        }
        *n += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for loc in first_seen {
        let n = counts[loc];
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((loc, n));
        }
    }
    best.map(|(loc, _)| loc.to_string())
}
