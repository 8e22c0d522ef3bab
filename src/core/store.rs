use chrono::Utc;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    contest::{ContestEntry, NewContest},
    op::{Op, StoredOp, now_ms},
    types::{EntryId, LineId, OpSeq},
};

/// Reasons an append or replay is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An entry with this id is already stored.
    #[error("entry {0} already exists")]
    AlreadyExists(EntryId),
    /// The contest carries no line setup.
    #[error("a contest needs at least one line setup")]
    NoLines,
    /// Two line setups share an id.
    #[error("duplicate line id {0:?}")]
    DuplicateLineId(LineId),
    /// The record could not be turned into a document.
    #[error("document encoding failed: {0}")]
    Document(String),
}

/// One stored document inside a [`StoreSnapshotV1`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Entry id.
    pub id: EntryId,
    /// Persisted document.
    pub document: Value,
}

/// Serializable checkpoint of the whole store, records in delivery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next id to hand out.
    pub next_entry_id: EntryId,
    /// Next op sequence to hand out.
    pub next_op_seq: OpSeq,
    /// Stored documents, date descending.
    pub records: Vec<SnapshotRecord>,
}

/// Authoritative, append-only contest store.
///
/// Entries are kept in delivery order: date descending, entries sharing a
/// date in the order they were appended. The stored document of each entry
/// is kept as written, so checkpoints carry labels and fields the decoded
/// record cannot represent.
#[derive(Debug, Default)]
pub struct ContestStore {
    records: HashMap<EntryId, ContestEntry>,
    documents: HashMap<EntryId, Value>,
    order: Vec<EntryId>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
    next_entry_id: EntryId,
}

impl ContestStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            next_entry_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from a checkpoint.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_entry_id: snapshot.next_entry_id,
            next_op_seq: snapshot.next_op_seq,
            ..Self::default()
        };

        for rec in snapshot.records {
            if store.records.contains_key(&rec.id) {
                return Err(StoreError::AlreadyExists(rec.id));
            }
            let entry = ContestEntry::from_document(rec.id, &rec.document);
            store.order.push(rec.id);
            store.records.insert(rec.id, entry);
            store.documents.insert(rec.id, rec.document);
        }

        Ok(store)
    }

    /// Exports a checkpoint of the current state, each record carrying its
    /// document exactly as it was stored.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        let records = self
            .order
            .iter()
            .filter_map(|id| {
                let document = self.documents.get(id)?.clone();
                Some(SnapshotRecord { id: *id, document })
            })
            .collect();

        StoreSnapshotV1 {
            next_entry_id: self.next_entry_id,
            next_op_seq: self.next_op_seq,
            records,
        }
    }

    /// Validates and appends a contest, stamping its id and creation time.
    ///
    /// The resulting op is also queued for [`Self::drain_pending_ops`].
    pub fn append(&mut self, contest: NewContest) -> Result<(EntryId, StoredOp), StoreError> {
        let stored = self.stage(contest)?;
        let id = self.commit(stored.clone())?;
        self.pending_ops.push(stored.clone());
        Ok((id, stored))
    }

    /// Validates a contest and reserves its id and sequence without making
    /// it visible. Pair with [`Self::commit`].
    pub fn stage(&mut self, contest: NewContest) -> Result<StoredOp, StoreError> {
        validate_lines(&contest)?;

        // The id is not part of the document; nothing is reserved until
        // encoding succeeded.
        let document = ContestEntry::from_new(0, contest, Utc::now())
            .to_document()
            .map_err(|e| StoreError::Document(e.to_string()))?;

        let id = self.next_entry_id;
        self.next_entry_id += 1;
        let seq = self.take_next_op_seq();

        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Append { id, document },
        })
    }

    /// Makes a staged op visible to readers.
    pub fn commit(&mut self, stored: StoredOp) -> Result<EntryId, StoreError> {
        let seq = stored.seq;
        match stored.op {
            Op::Append { id, document } => self.apply_append_with_seq(id, &document, seq),
        }
    }

    /// Applies an op read back from the journal.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        self.commit(stored).map(|_| ())
    }

    /// Looks up one entry.
    pub fn get(&self, id: EntryId) -> Option<&ContestEntry> {
        self.records.get(&id)
    }

    /// Looks up one entry, cloned.
    pub fn get_cloned(&self, id: EntryId) -> Option<ContestEntry> {
        self.get(id).cloned()
    }

    /// All entries in delivery order.
    pub fn entries(&self) -> Vec<&ContestEntry> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    /// All entries in delivery order, cloned.
    pub fn snapshot(&self) -> Vec<ContestEntry> {
        self.entries().into_iter().cloned().collect()
    }

    /// Entry ids in delivery order.
    pub fn ordered_ids(&self) -> &[EntryId] {
        &self.order
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Takes the ops appended since the last drain.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Highest sequence handed out so far.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn apply_append_with_seq(
        &mut self,
        id: EntryId,
        document: &Value,
        seq: OpSeq,
    ) -> Result<EntryId, StoreError> {
        if self.records.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }

        let entry = ContestEntry::from_document(id, document);
        let records = &self.records;
        let pos = self
            .order
            .partition_point(|other| records.get(other).is_some_and(|r| r.date >= entry.date));
        self.order.insert(pos, id);
        self.records.insert(id, entry);
        self.documents.insert(id, document.clone());

        self.next_entry_id = self.next_entry_id.max(id.saturating_add(1));
        self.bump_next_seq_from(seq);
        Ok(id)
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn validate_lines(contest: &NewContest) -> Result<(), StoreError> {
    if contest.lines.is_empty() {
        return Err(StoreError::NoLines);
    }
    let mut seen = HashSet::with_capacity(contest.lines.len());
    for line in &contest.lines {
        if !seen.insert(line.id.as_str()) {
            return Err(StoreError::DuplicateLineId(line.id.clone()));
        }
    }
    Ok(())
}
