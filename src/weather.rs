//! Simulated historical weather keyed by location and date.
//!
//! The reading is synthetic: a keyword in the location picks a bucket, and
//! a hash of `"{location}-{date}"` nudges its base temperature by a few
//! degrees. Identical inputs always give identical readings.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lowest temperature the estimator reports, in °C.
pub const MIN_TEMPERATURE: i32 = -5;

/// Synthetic weather reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeatherSnapshot {
    /// Temperature in °C.
    pub temperature: i32,
    /// Condition label.
    pub condition: &'static str,
    /// Display icon.
    pub icon: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Overcast,
    Rain,
    Sun,
    Wind,
    Snow,
}

impl Bucket {
    fn condition(self) -> &'static str {
        match self {
            Bucket::Overcast => "Couvert",
            Bucket::Rain => "Pluie",
            Bucket::Sun => "Soleil",
            Bucket::Wind => "Vent",
            Bucket::Snow => "Neige",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Bucket::Overcast => "☁️",
            Bucket::Rain => "🌧️",
            Bucket::Sun => "☀️",
            Bucket::Wind => "🌬️",
            Bucket::Snow => "❄️",
        }
    }

    fn base_temp(self) -> i32 {
        match self {
            Bucket::Overcast => 15,
            Bucket::Rain => 12,
            Bucket::Sun => 22,
            Bucket::Wind => 14,
            Bucket::Snow => 0,
        }
    }
}

// Scanned in order; the first keyword found wins.
const KEYWORDS: &[(&str, Bucket)] = &[
    ("pluie", Bucket::Rain),
    ("pluieux", Bucket::Rain),
    ("orage", Bucket::Rain),
    ("soleil", Bucket::Sun),
    ("ensoleill", Bucket::Sun),
    ("vent", Bucket::Wind),
    ("rafale", Bucket::Wind),
    ("neige", Bucket::Snow),
];

fn bucket_for(location: &str) -> Bucket {
    let normalized = location.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| normalized.contains(keyword))
        .map(|(_, bucket)| *bucket)
        .unwrap_or(Bucket::Overcast)
}

/// Polynomial rolling hash (`h * 31 + c`) over UTF-16 code units, wrapped
/// to `i32`, then made non-negative.
pub fn hash_string(value: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in value.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs()
}

/// Computes the synthetic reading for `location` on `date`.
///
/// Never fails; an empty location falls back to the overcast bucket and
/// still hashes the date.
pub fn estimate(location: &str, date: &str) -> WeatherSnapshot {
    let bucket = bucket_for(location);
    let jitter = (hash_string(&format!("{location}-{date}")) % 6) as i32 - 3;
    WeatherSnapshot {
        temperature: (bucket.base_temp() + jitter).max(MIN_TEMPERATURE),
        condition: bucket.condition(),
        icon: bucket.icon(),
    }
}

/// Async front for [`estimate`] that simulates lookup latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherEstimator {
    /// Simulated lookup delay in milliseconds.
    pub latency_ms: u64,
}

impl Default for WeatherEstimator {
    fn default() -> Self {
        Self { latency_ms: 350 }
    }
}

impl WeatherEstimator {
    /// Resolves the reading after the configured delay.
    pub async fn fetch(&self, location: &str, date: &str) -> WeatherSnapshot {
        tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        estimate(location, date)
    }
}

/// Generation counter deciding whether a finished lookup may still be shown.
///
/// Each [`WeatherGuard::begin`] or [`WeatherGuard::invalidate`] makes every
/// earlier ticket stale. Dropping the guard does the same.
#[derive(Debug, Default)]
pub struct WeatherGuard {
    generation: Arc<AtomicU64>,
}

/// Proof that a lookup was started at a given generation.
#[derive(Debug, Clone)]
pub struct WeatherTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl WeatherGuard {
    /// Starts a new lookup, superseding any in flight.
    pub fn begin(&self) -> WeatherTicket {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        WeatherTicket {
            generation,
            current: Arc::clone(&self.generation),
        }
    }

    /// Marks every outstanding ticket stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// True when `ticket` was issued by the latest [`Self::begin`] and
    /// nothing invalidated it since.
    pub fn is_current(&self, ticket: &WeatherTicket) -> bool {
        Arc::ptr_eq(&self.generation, &ticket.current) && ticket.is_live()
    }
}

impl Drop for WeatherGuard {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl WeatherTicket {
    /// True while no newer lookup or invalidation happened.
    pub fn is_live(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }
}
