//! Persistence abstraction for the append-only document journal.

/// SQLite-backed journal.
pub mod sqlite;

use crate::{
    core::store::{StoreError, StoreSnapshotV1},
    op::StoredOp,
    types::OpSeq,
};

/// Failures raised while writing or reading the journal.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// SQLite rejected a statement.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Replay produced a state the store refused.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Anything else, already rendered.
    #[error("{0}")]
    Message(String),
}

/// Result alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for appended documents.
///
/// Implementations are driven from a blocking worker thread, one batch at
/// a time.
pub trait DocumentSink: Send {
    /// Writes `ops` and returns the highest sequence now durable.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Forces buffered writes to stable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Records a checkpoint covering every op up to `last_seq`.
    fn write_snapshot(
        &mut self,
        _snapshot: &StoreSnapshotV1,
        _last_seq: OpSeq,
    ) -> PersistResult<()> {
        Ok(())
    }
    /// Drops journal rows already covered by a checkpoint.
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
