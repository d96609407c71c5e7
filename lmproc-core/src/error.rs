//! Error types for lmproc-core.

use std::fmt;
use thiserror::Error;

/// Result type alias for lmproc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for list-mode processing.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested time window is negative or inverted.
    #[error("invalid time window [{tstart}, {tstop}): need 0 <= tstart < tstop")]
    InvalidWindow { tstart: i64, tstop: i64 },

    /// A stream word could not be decoded or resolved.
    #[error("malformed record at byte {offset}: {word:#010x} ({reason})")]
    MalformedRecord {
        offset: usize,
        word: u32,
        reason: MalformedReason,
    },

    /// A caller-provided buffer does not have the length the geometry implies.
    #[error("size mismatch for `{buffer}`: expected {expected} elements, got {actual}")]
    SizeMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Configuration error (scanner constants or geometry tables).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Why a record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Tag bits match no known record kind.
    UnknownKind,
    /// The stream ends inside a word.
    TruncatedWord,
    /// The transaxial address has no entry in the LOR-to-bin map.
    UnmappedLor,
    /// The ring-pair code is past the end of the axial table.
    RingPairOutOfRange,
    /// The bucket index is past the configured bucket count.
    BucketOutOfRange,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            MalformedReason::UnknownKind => "unknown record kind",
            MalformedReason::TruncatedWord => "truncated word",
            MalformedReason::UnmappedLor => "unmapped line of response",
            MalformedReason::RingPairOutOfRange => "ring pair out of range",
            MalformedReason::BucketOutOfRange => "bucket out of range",
        };
        f.write_str(reason)
    }
}

impl Error {
    /// Shorthand for a [`Error::MalformedRecord`].
    #[must_use]
    pub fn malformed(offset: usize, word: u32, reason: MalformedReason) -> Self {
        Error::MalformedRecord {
            offset,
            word,
            reason,
        }
    }
}
