//! Journal operation model.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{EntryId, OpSeq};

/// Format tag written next to every journal row and checkpoint.
pub const JOURNAL_FORMAT_VERSION: u16 = 1;

/// Change recorded in the journal.
///
/// The store never edits or removes a contest, so appending a document is
/// the only change there is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Append a contest document.
    Append {
        /// Store-assigned entry id.
        id: EntryId,
        /// Document exactly as persisted.
        document: Value,
    },
}

/// An op stamped with its journal position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic sequence, starting at 1.
    pub seq: OpSeq,
    /// Wall-clock time the op was staged, in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
