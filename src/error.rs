//! EpiGridError: unified error type for epigrid public APIs.
//!
//! Every fallible operation in the crate reports through this enum so the
//! driver can map failures onto a single global-abort policy: configuration,
//! distribution, exchange, and output errors are fatal; numerical anomalies
//! are recovered locally by the integrator and only counted.

use thiserror::Error;

use crate::topology::CellId;

/// Unified error type for epigrid operations.
#[derive(Debug, Error)]
pub enum EpiGridError {
    /// Rejected before any collective runs (coordinator-side validation).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Grid with zero cells; there is nothing to partition.
    #[error("grid is empty: {rows}x{cols} cells")]
    EmptyGrid {
        /// Configured row count.
        rows: usize,
        /// Configured column count.
        cols: usize,
    },

    /// A peer exchange failed or returned no payload.
    #[error("communication with rank {neighbor} failed: {detail}")]
    Comm {
        /// Peer rank involved in the failed exchange.
        neighbor: usize,
        /// Backend-provided detail.
        detail: String,
    },

    /// A received payload did not have the negotiated byte length.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        /// Peer rank the payload came from.
        neighbor: usize,
        /// Negotiated byte length.
        expected: usize,
        /// Actual byte length received.
        got: usize,
    },

    /// A stream record announced a negative or impossible element count.
    #[error("invalid wire count {count} from rank {from}")]
    InvalidWireCount {
        /// Announced count.
        count: i32,
        /// Sending rank.
        from: usize,
    },

    /// A payload's byte length is not a multiple of its record stride.
    #[error("payload of {bytes} bytes is not divisible by record stride {stride}")]
    NonDivisiblePayload {
        /// Received byte length.
        bytes: usize,
        /// Size of one record in bytes.
        stride: usize,
    },

    /// A rank requested initial state for a cell the dataset does not hold.
    #[error("requested cell id {0} is outside the initial-condition dataset")]
    UnknownCellId(CellId),

    /// The initial-condition source delivered a row of the wrong width.
    #[error("initial-condition row {row} has {got} values, expected {expected}")]
    RowWidthMismatch {
        /// Row (cell) id.
        row: CellId,
        /// Actual value count.
        got: usize,
        /// Value count announced by the source.
        expected: usize,
    },

    /// An initial-condition row could not be mapped to a valid SIR state.
    #[error("row {row} does not map to a valid SIR state: {reason}")]
    BadInitialState {
        /// Row (cell) id.
        row: CellId,
        /// Mapper-provided detail.
        reason: String,
    },

    /// Writing the result sink failed (coordinator only).
    #[error("result output failed: {0}")]
    Output(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EpiGridError>;

impl EpiGridError {
    /// Shorthand for a peer-exchange failure with formatted detail.
    pub fn comm(neighbor: usize, detail: impl Into<String>) -> Self {
        EpiGridError::Comm {
            neighbor,
            detail: detail.into(),
        }
    }
}
