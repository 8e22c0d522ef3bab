//! SQLite-backed contest journal.
//!
//! One `journal` row per appended contest, holding the document as JSON
//! text next to its id and contest date. `checkpoints` holds whole-store
//! snapshots so replay can skip the rows they cover.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;

use crate::{
    core::store::{ContestStore, StoreSnapshotV1},
    op::{JOURNAL_FORMAT_VERSION, Op, StoredOp, now_ms},
    types::{EntryId, OpSeq},
};

use super::{DocumentSink, PersistError, PersistResult};

/// Journal of contest documents stored in one SQLite file.
pub struct SqliteDocumentSink {
    conn: Connection,
}

impl SqliteDocumentSink {
    /// Opens or creates a journal at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        Self::prepare(Connection::open(path)?)
    }

    /// Opens a throwaway journal held in memory.
    pub fn open_in_memory() -> PersistResult<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> PersistResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    /// Rebuilds the store from the newest checkpoint plus the journal rows
    /// written after it.
    pub fn load_store(&self) -> PersistResult<ContestStore> {
        let mut store = match self.latest_checkpoint()? {
            Some(state) => ContestStore::from_snapshot(state)?,
            None => ContestStore::new(),
        };

        let tail = self.load_events_after(store.latest_op_seq())?;
        let replayed = tail.len();
        for stored in tail {
            store.apply_replayed_op(stored)?;
        }
        tracing::debug!(entries = store.len(), replayed, "Loaded contest journal");
        Ok(store)
    }

    /// Journal rows with a sequence above `seq`, oldest first.
    pub fn load_events_after(&self, seq: OpSeq) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, entry_id, recorded_ms, format_version, document \
             FROM journal WHERE seq > ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![seq as i64], JournalRow::read)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_stored_op()?);
        }
        Ok(out)
    }

    /// Records a checkpoint of the whole store covering every row up to
    /// `through_seq`.
    pub fn write_snapshot(
        &mut self,
        state: &StoreSnapshotV1,
        through_seq: OpSeq,
    ) -> PersistResult<()> {
        let encoded = serde_json::to_string(state)?;
        self.conn.execute(
            "INSERT INTO checkpoints(through_seq, recorded_ms, format_version, state) \
             VALUES (?1, ?2, ?3, ?4)",
            params![through_seq as i64, now_ms() as i64, JOURNAL_FORMAT_VERSION, encoded],
        )?;
        Ok(())
    }

    /// Drops journal rows up to and including `seq`; returns how many.
    pub fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM journal WHERE seq <= ?1", params![seq as i64])?)
    }

    /// Highest sequence in the journal, or 0 when it is empty.
    pub fn latest_seq(&self) -> PersistResult<OpSeq> {
        let seq = self
            .conn
            .query_row("SELECT MAX(seq) FROM journal", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as OpSeq)
    }

    /// Number of contests recorded for `date` in the journal tail.
    pub fn count_on_date(&self, date: &str) -> PersistResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM journal WHERE contest_date = ?1",
            params![date],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn latest_checkpoint(&self) -> PersistResult<Option<StoreSnapshotV1>> {
        let row: Option<(u16, String)> = self
            .conn
            .query_row(
                "SELECT format_version, state FROM checkpoints ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((version, state)) = row else {
            return Ok(None);
        };
        if version != JOURNAL_FORMAT_VERSION {
            return Err(PersistError::Message(format!(
                "unsupported checkpoint format: {version}"
            )));
        }
        Ok(Some(serde_json::from_str(&state)?))
    }
}

impl DocumentSink for SqliteDocumentSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let Some(last) = ops.last() else {
            return self.latest_seq();
        };

        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO journal(seq, entry_id, contest_date, recorded_ms, \
                 format_version, document) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for stored in ops {
                let Op::Append { id, document } = &stored.op;
                let date = document.get("date").and_then(Value::as_str).unwrap_or_default();
                insert.execute(params![
                    stored.seq as i64,
                    *id as i64,
                    date,
                    stored.ts_ms as i64,
                    JOURNAL_FORMAT_VERSION,
                    serde_json::to_string(document)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(last.seq)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        SqliteDocumentSink::write_snapshot(self, snapshot, last_seq)
    }

    fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        SqliteDocumentSink::compact_through(self, seq)
    }
}

struct JournalRow {
    seq: i64,
    entry_id: i64,
    recorded_ms: i64,
    format_version: u16,
    document: String,
}

impl JournalRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            entry_id: row.get(1)?,
            recorded_ms: row.get(2)?,
            format_version: row.get(3)?,
            document: row.get(4)?,
        })
    }

    // A document that is not valid JSON still yields an entry; the decoder
    // fills every field with its default.
    fn into_stored_op(self) -> PersistResult<StoredOp> {
        if self.format_version != JOURNAL_FORMAT_VERSION {
            return Err(PersistError::Message(format!(
                "unsupported journal format {} at seq {}",
                self.format_version, self.seq
            )));
        }
        let document = serde_json::from_str(&self.document).unwrap_or_else(|err| {
            tracing::warn!(seq = self.seq, error = %err, "Unreadable contest document");
            Value::Null
        });
        Ok(StoredOp {
            seq: self.seq as OpSeq,
            ts_ms: self.recorded_ms as u64,
            op: Op::Append {
                id: self.entry_id as EntryId,
                document,
            },
        })
    }
}
