use serde_json::json;

use catchlog::{
    contest::{LineSetup, NewContest},
    core::store::{ContestStore, SnapshotRecord, StoreError, StoreSnapshotV1},
    types::{CatchType, WaterCharacteristic},
};

fn line(id: &str) -> LineSetup {
    LineSetup {
        id: id.to_string(),
        float_size: None,
        main_line: None,
        length_meters: None,
        hook: String::new(),
        rig_notes: String::new(),
        remarks: String::new(),
    }
}

fn contest(date: &str, location: &str) -> NewContest {
    NewContest {
        date: date.to_string(),
        location: location.to_string(),
        total_weight: 1500.0,
        ranking: String::new(),
        water_characteristic: WaterCharacteristic::Calme,
        temperature: None,
        weather_conditions: vec![],
        lines: vec![line("a")],
        groundbait_recipe: String::new(),
        feeding_strategy: String::new(),
        hook_baits: vec![],
        catches: vec![CatchType::Gardons],
    }
}

#[test]
fn append_yields_monotonic_ids_and_seqs() {
    let mut store = ContestStore::new();
    let (id1, op1) = store.append(contest("2024-05-01", "Messancy")).unwrap();
    let (id2, op2) = store.append(contest("2024-05-02", "Arlon")).unwrap();
    let (id3, op3) = store.append(contest("2024-05-03", "Virton")).unwrap();

    assert_eq!((id1, id2, id3), (1, 2, 3));
    assert_eq!((op1.seq, op2.seq, op3.seq), (1, 2, 3));
    assert_eq!(store.latest_op_seq(), 3);
    assert_eq!(store.drain_pending_ops().len(), 3);
    assert!(store.drain_pending_ops().is_empty());
}

#[test]
fn snapshot_is_date_descending_with_ties_in_append_order() {
    let mut store = ContestStore::new();
    let (a, _) = store.append(contest("2024-04-01", "A")).unwrap();
    let (b, _) = store.append(contest("2024-06-01", "B")).unwrap();
    let (c, _) = store.append(contest("2024-04-01", "C")).unwrap();
    let (d, _) = store.append(contest("2024-05-01", "D")).unwrap();

    assert_eq!(store.ordered_ids(), &[b, d, a, c]);
    let dates: Vec<String> = store.snapshot().into_iter().map(|e| e.date).collect();
    assert_eq!(dates, ["2024-06-01", "2024-05-01", "2024-04-01", "2024-04-01"]);
}

#[test]
fn store_stamps_creation_time() {
    let mut store = ContestStore::new();
    let (id, _) = store.append(contest("2024-05-01", "Messancy")).unwrap();
    let entry = store.get(id).expect("entry");
    assert!(entry.created_at.is_some());
    assert_eq!(entry.water_characteristic, Some(WaterCharacteristic::Calme));
}

#[test]
fn contest_without_lines_is_rejected() {
    let mut store = ContestStore::new();
    let mut c = contest("2024-05-01", "Messancy");
    c.lines.clear();
    assert_eq!(store.append(c), Err(StoreError::NoLines));
    assert!(store.is_empty());
}

#[test]
fn duplicate_line_ids_are_rejected() {
    let mut store = ContestStore::new();
    let mut c = contest("2024-05-01", "Messancy");
    c.lines = vec![line("x"), line("y"), line("x")];
    assert_eq!(
        store.append(c),
        Err(StoreError::DuplicateLineId("x".to_string()))
    );
    assert!(store.is_empty());
}

#[test]
fn rejected_stage_reserves_no_id_or_seq() {
    let mut store = ContestStore::new();
    let mut bad = contest("2024-05-01", "Messancy");
    bad.lines = vec![line("x"), line("x")];
    assert!(store.stage(bad).is_err());
    let mut empty = contest("2024-05-02", "Arlon");
    empty.lines.clear();
    assert!(store.stage(empty).is_err());
    assert_eq!(store.latest_op_seq(), 0);

    let staged = store.stage(contest("2024-05-03", "Virton")).unwrap();
    assert_eq!(staged.seq, 1);
    assert_eq!(store.commit(staged), Ok(1));
}

#[test]
fn staged_contest_stays_hidden_until_committed() {
    let mut store = ContestStore::new();
    let staged = store.stage(contest("2024-05-01", "Messancy")).unwrap();
    assert!(store.is_empty());

    let id = store.commit(staged.clone()).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.commit(staged), Err(StoreError::AlreadyExists(id)));
}

#[test]
fn snapshot_export_and_import_round_trips() {
    let mut store = ContestStore::new();
    for (i, date) in ["2024-01-01", "2024-03-01", "2024-02-01"].iter().enumerate() {
        store.append(contest(date, &format!("Lac {i}"))).unwrap();
    }

    let snapshot = store.export_snapshot();
    let restored = ContestStore::from_snapshot(snapshot.clone()).unwrap();
    assert_eq!(restored.ordered_ids(), store.ordered_ids());
    assert_eq!(restored.snapshot(), store.snapshot());
    assert_eq!(restored.latest_op_seq(), store.latest_op_seq());

    let mut restored = restored;
    let (next, _) = restored.append(contest("2024-04-01", "Arlon")).unwrap();
    assert_eq!(next, 4);
}

#[test]
fn export_returns_documents_exactly_as_stored() {
    let document = json!({
        "date": "2023-06-11",
        "location": "Virton",
        "totalWeight": 900,
        "waterCharacteristic": "Verte",
        "catches": ["Ablettes", "Gardons"],
        "lines": [{ "id": "l1" }],
    });
    let snapshot = StoreSnapshotV1 {
        next_entry_id: 8,
        next_op_seq: 8,
        records: vec![SnapshotRecord {
            id: 7,
            document: document.clone(),
        }],
    };

    let store = ContestStore::from_snapshot(snapshot.clone()).unwrap();
    let entry = store.get(7).unwrap();
    assert_eq!(entry.water_characteristic, None);
    assert_eq!(entry.catches, vec![CatchType::Gardons]);

    assert_eq!(store.export_snapshot(), snapshot);
}
