//! Runtime event stream payloads.

use crate::types::{EntryId, OpSeq};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContestEvent {
    /// A contest was appended and is visible to readers.
    Appended {
        /// Appended entry id.
        id: EntryId,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
