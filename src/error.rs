//! Error handling and exit codes

use std::io;

use thiserror::Error;

use crate::topology::Rank;

/// Exit code reported when a rank thread panics, matching the code of a panicking Rust process.
pub const PANIC_EXIT_CODE: i32 = 101;

/// Result type used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Set of errors that are possible in a process group.
#[derive(Debug, Error)]
pub enum Error {
    /// A group needs at least one participant and its size must fit a `Rank`
    #[error("invalid group size {0}")]
    InvalidGroupSize(usize),
    /// Invalid rank argument
    #[error("rank {rank} is outside of a group of size {size}")]
    InvalidRank {
        /// The offending rank
        rank: i64,
        /// Size of the group
        size: Rank,
    },
    /// An even split was requested for a length that the group size does not divide
    #[error("{len} elements cannot be split evenly across {parts} processes")]
    NotDivisible {
        /// Number of elements
        len: usize,
        /// Number of processes
        parts: usize,
    },
    /// The coordinator was given an array length that cannot be allocated
    #[error("invalid number of elements {0}")]
    InvalidLength(i64),
    /// Collective argument not identical on all processes
    #[error("expected {expected} elements but got {actual}")]
    CountMismatch {
        /// Count the receiver was prepared for
        expected: usize,
        /// Count that actually arrived
        actual: usize,
    },
    /// A message carried a different element type than the receiver asked for
    #[error("message from rank {source_rank} does not hold elements of type {expected}")]
    TypeMismatch {
        /// Sender of the message
        source_rank: Rank,
        /// Element type the receiver asked for
        expected: &'static str,
    },
    /// The group was aborted, either by this rank or by a peer
    #[error("process group aborted by rank {origin} with error code {code}")]
    Aborted {
        /// Error code passed to `abort`
        code: i32,
        /// Rank that called `abort`
        origin: Rank,
    },
    /// A rank thread panicked
    #[error("rank {rank} panicked")]
    RankPanicked {
        /// Rank whose thread panicked
        rank: Rank,
    },
    /// The mailbox of a rank lost all of its senders
    #[error("mailbox of rank {rank} is disconnected")]
    Disconnected {
        /// Owner of the mailbox
        rank: Rank,
    },
    /// A console token was not an integer
    #[error("cannot parse {token:?} as an integer")]
    Parse {
        /// The offending token
        token: String,
        /// Underlying parse error
        #[source]
        source: std::num::ParseIntError,
    },
    /// Input ended before all expected values were read
    #[error("input ended while reading {what}")]
    UnexpectedEof {
        /// What was being read
        what: &'static str,
    },
    /// Console I/O failed
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A rank thread could not be spawned
    #[error("failed to spawn thread for rank {rank}")]
    Spawn {
        /// Rank whose thread failed to start
        rank: Rank,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Process exit status a binary should terminate with after this error.
    ///
    /// Aborts carry the code passed to `abort`, panics map to `PANIC_EXIT_CODE` and every other
    /// error maps to `1`.
    pub fn exit_code(&self) -> i32 {
        match *self {
            Error::Aborted { code, .. } => code,
            Error::RankPanicked { .. } => PANIC_EXIT_CODE,
            _ => 1,
        }
    }

    /// Whether this error is the observation of a group-wide abort
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }
}
