//! Fishing-contest journal: an authoritative in-memory log of contests with
//! append-only SQLite journaling, dashboard statistics, and simulated
//! historical weather.
//!
//! # Examples
//!
//! Aggregating a list of contests with [`engine::stats::summarize`]:
//! ```
//! use catchlog::{
//!     contest::{LineSetup, NewContest},
//!     core::store::ContestStore,
//!     engine::stats::summarize,
//!     types::WaterCharacteristic,
//! };
//!
//! fn contest(date: &str, weight: f64, ranking: &str) -> NewContest {
//!     NewContest {
//!         date: date.to_string(),
//!         location: "Messancy".to_string(),
//!         total_weight: weight,
//!         ranking: ranking.to_string(),
//!         water_characteristic: WaterCharacteristic::Claire,
//!         temperature: None,
//!         weather_conditions: vec![],
//!         lines: vec![LineSetup {
//!             id: "line-1".to_string(),
//!             float_size: None,
//!             main_line: None,
//!             length_meters: None,
//!             hook: String::new(),
//!             rig_notes: String::new(),
//!             remarks: String::new(),
//!         }],
//!         groundbait_recipe: String::new(),
//!         feeding_strategy: String::new(),
//!         hook_baits: vec![],
//!         catches: vec![],
//!     }
//! }
//!
//! let mut store = ContestStore::new();
//! store.append(contest("2024-05-01", 3000.0, "Gagné")).expect("append");
//! store.append(contest("2024-04-01", 1000.0, "3e")).expect("append");
//!
//! let stats = summarize(&store.snapshot()).expect("stats");
//! assert_eq!(stats.average_weight, 2000.0);
//! assert_eq!(stats.favorite_location.as_deref(), Some("Messancy"));
//! assert_eq!(stats.win_rate, 50);
//! ```
//!
//! Runtime usage with the SQLite journal and the entry builder:
//! ```no_run
//! use catchlog::{
//!     builder::{DraftField, EntryBuilder},
//!     core::store::ContestStore,
//!     persist::sqlite::SqliteDocumentSink,
//!     runtime::handle::{spawn_contest_log, AckMode, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteDocumentSink::open("contests.db").expect("open sqlite");
//! let store = sink.load_store().expect("load");
//! let cfg = RuntimeConfig { ack_mode: AckMode::Durable, ..RuntimeConfig::default() };
//! let handle = spawn_contest_log(store, Some(Box::new(sink)), cfg);
//!
//! let mut builder = EntryBuilder::new();
//! builder.set_field(DraftField::Location("Messancy, place 9".to_string()));
//! builder.set_field(DraftField::TotalWeight("4250".to_string()));
//! let _id = builder.submit(&handle).await.expect("submit");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Draft editing and submission.
pub mod builder;
/// Contest records and document decoding.
pub mod contest;
/// Core in-memory store.
pub mod core;
/// Statistics, filtering and pagination.
pub mod engine;
/// Journal op model.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Repository seam between builder and store.
pub mod repository;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types and option lists.
pub mod types;
/// Simulated historical weather.
pub mod weather;
