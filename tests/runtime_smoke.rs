use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use catchlog::{
    contest::{LineSetup, NewContest},
    core::store::{ContestStore, StoreError},
    op::StoredOp,
    persist::{DocumentSink, PersistError, PersistResult, sqlite::SqliteDocumentSink},
    runtime::{
        events::ContestEvent,
        handle::{AckMode, RuntimeConfig, RuntimeError, spawn_contest_log},
    },
    types::{OpSeq, WaterCharacteristic},
};

fn contest(date: &str, location: &str) -> NewContest {
    NewContest {
        date: date.to_string(),
        location: location.to_string(),
        total_weight: 1200.0,
        ranking: String::new(),
        water_characteristic: WaterCharacteristic::Courante,
        temperature: None,
        weather_conditions: vec![],
        lines: vec![LineSetup {
            id: "l1".to_string(),
            float_size: None,
            main_line: None,
            length_meters: None,
            hook: String::new(),
            rig_notes: String::new(),
            remarks: String::new(),
        }],
        groundbait_recipe: String::new(),
        feeding_strategy: String::new(),
        hook_baits: vec![],
        catches: vec![],
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Blocks every write until the test drops the release side of `gate`.
struct GatedSink {
    gate: std::sync::mpsc::Receiver<()>,
    written: Arc<Mutex<Vec<OpSeq>>>,
}

impl DocumentSink for GatedSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let _ = self.gate.recv();
        let mut written = self.written.lock().expect("lock");
        written.extend(ops.iter().map(|stored| stored.seq));
        Ok(written.last().copied().unwrap_or(0))
    }
}

struct OfflineSink;

impl DocumentSink for OfflineSink {
    fn append_ops(&mut self, _ops: &[StoredOp]) -> PersistResult<OpSeq> {
        Err(PersistError::Message("network unreachable".to_string()))
    }
}

#[tokio::test]
async fn append_publishes_snapshot_and_events_in_order() {
    init_tracing();
    let handle = spawn_contest_log(ContestStore::new(), None, RuntimeConfig::default());
    let mut sub = handle.subscribe();
    let mut entries = handle.watch_entries();
    assert!(entries.borrow_and_update().is_empty());

    let older = handle.append(contest("2024-04-01", "Arlon")).await.expect("append");
    let newer = handle.append(contest("2024-05-01", "Messancy")).await.expect("append");

    assert!(entries.has_changed().expect("watch open"));
    let snapshot = entries.borrow_and_update().clone();
    let ids: Vec<_> = snapshot.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![newer, older]);

    let rec = handle.get(older).await.expect("get").expect("record");
    assert_eq!(rec.location, "Arlon");
    assert_eq!(handle.snapshot().await.expect("snapshot").len(), 2);

    let appended: Vec<ContestEvent> = std::iter::from_fn(|| sub.try_recv().ok())
        .filter(|evt| matches!(evt, ContestEvent::Appended { .. }))
        .collect();
    assert_eq!(
        appended,
        vec![
            ContestEvent::Appended { id: older },
            ContestEvent::Appended { id: newer },
        ]
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn rejected_contest_leaves_snapshot_untouched() {
    let handle = spawn_contest_log(ContestStore::new(), None, RuntimeConfig::default());
    let entries = handle.watch_entries();

    let mut bad = contest("2024-05-01", "Messancy");
    bad.lines.clear();
    let err = handle.append(bad).await.expect_err("no lines");
    assert!(matches!(err, RuntimeError::Store(StoreError::NoLines)));
    assert!(entries.borrow().is_empty());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn stalled_journal_rejects_appends_once_queue_is_full() {
    let (release, gate) = std::sync::mpsc::channel::<()>();
    let written = Arc::new(Mutex::new(Vec::new()));
    let sink = GatedSink {
        gate,
        written: Arc::clone(&written),
    };
    let cfg = RuntimeConfig {
        ack_mode: AckMode::InMemory,
        persist_queue_bound: 1,
        snapshot_every_ops: 0,
        ..RuntimeConfig::default()
    };
    let handle = spawn_contest_log(ContestStore::new(), Some(Box::new(sink)), cfg);

    // One batch stuck in the sink plus one queued op is all that fits.
    let mut accepted = Vec::new();
    let mut rejected = None;
    for day in 1..=4u32 {
        match handle.append(contest(&format!("2024-06-{day:02}"), "Arlon")).await {
            Ok(id) => accepted.push(id),
            Err(err) => {
                rejected = Some(err);
                break;
            }
        }
    }
    assert!(matches!(rejected, Some(RuntimeError::Persist(_))));
    assert!((1..=2).contains(&accepted.len()));
    assert_eq!(handle.snapshot().await.expect("snapshot").len(), accepted.len());

    drop(release);
    let durable = handle.flush().await.expect("flush");
    let written = written.lock().expect("lock").clone();
    assert_eq!(written.len(), accepted.len());
    assert_eq!(written.last().copied(), Some(durable));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn durable_ack_hides_contest_when_journal_write_fails() {
    let cfg = RuntimeConfig {
        ack_mode: AckMode::Durable,
        ..RuntimeConfig::default()
    };
    let handle = spawn_contest_log(ContestStore::new(), Some(Box::new(OfflineSink)), cfg);

    let err = handle
        .append(contest("2024-05-01", "Messancy"))
        .await
        .expect_err("offline");
    assert!(matches!(err, RuntimeError::Persist(_)));
    assert!(handle.snapshot().await.expect("snapshot").is_empty());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn default_config_waits_for_the_journal() {
    let handle = spawn_contest_log(
        ContestStore::new(),
        Some(Box::new(OfflineSink)),
        RuntimeConfig::default(),
    );

    let err = handle
        .append(contest("2024-05-01", "Messancy"))
        .await
        .expect_err("offline");
    assert!(matches!(err, RuntimeError::Persist(_)));
    assert!(handle.snapshot().await.expect("snapshot").is_empty());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn in_memory_journal_failure_is_reported_by_next_flush() {
    let cfg = RuntimeConfig {
        ack_mode: AckMode::InMemory,
        ..RuntimeConfig::default()
    };
    let handle = spawn_contest_log(ContestStore::new(), Some(Box::new(OfflineSink)), cfg);

    let id = handle
        .append(contest("2024-05-01", "Messancy"))
        .await
        .expect("in-memory ack");
    assert_eq!(id, 1);

    let err = handle.flush().await.expect_err("journal write failed");
    assert!(matches!(err, RuntimeError::Persist(_)));
    // Reported once; nothing is left to write afterwards.
    handle.flush().await.expect("second flush");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn durable_appends_survive_restart() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("runtime.db");

    let cfg = RuntimeConfig {
        ack_mode: AckMode::Durable,
        snapshot_every_ops: 2,
        compact_after_snapshot: true,
        ..RuntimeConfig::default()
    };
    let sink = SqliteDocumentSink::open(&db_path).expect("open");
    let store = sink.load_store().expect("load");
    let handle = spawn_contest_log(store, Some(Box::new(sink)), cfg.clone());
    for day in 1..=3u32 {
        handle
            .append(contest(&format!("2024-07-{day:02}"), "Virton"))
            .await
            .expect("append");
    }
    handle.checkpoint().await.expect("checkpoint");
    let before = handle.snapshot().await.expect("snapshot");
    handle.shutdown().await.expect("shutdown");

    let sink = SqliteDocumentSink::open(&db_path).expect("reopen");
    let store = sink.load_store().expect("reload");
    assert_eq!(store.snapshot(), *before);
}
