//! # epigrid
//!
//! epigrid is a distributed discrete-time SIR epidemic simulator over a
//! rectangular grid of cells. Cells are grouped into contiguous blocks,
//! blocks are assigned to a fixed pool of SPMD ranks, and each step the
//! ranks refresh boundary (ghost) state through a nonblocking halo
//! exchange before advancing their local cells with a forward-Euler
//! integrator.
//!
//! ## Features
//! - Deterministic contiguous partitioning with balanced rank ownership
//! - Cell- and block-level adjacency with interior/ghost classification
//! - Coordinator-rooted distribution of block structure, initial state,
//!   and topology metadata
//! - Per-step halo exchange with receives posted before sends and a
//!   step-cycled tag discipline
//! - Pluggable communication backends: serial, threaded (one thread per
//!   rank), and MPI behind the `mpi-support` feature
//! - Rank-ordered CSV result collection on the coordinator
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! epigrid = "0.3"
//! # Optional: features = ["mpi-support"]
//! ```
//!
//! A run is bootstrapped collectively: every rank calls
//! [`sim::GridSimulation::bootstrap`] with the same configuration, the
//! coordinator supplying the initial-condition source. `run` executes the
//! step loop and `collect` gathers per-rank summary rows for the result
//! sink.

pub mod cli;
pub mod comm;
pub mod config;
pub mod error;
pub mod exchange;
pub mod init;
pub mod model;
pub mod partition;
pub mod sim;
pub mod topology;

/// A convenient prelude to import the most-used traits & types.
pub mod prelude {
    pub use crate::comm::{CommTag, Communicator, NoComm, SetupTags, ThreadComm, Wait};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::config::RunConfig;
    pub use crate::error::EpiGridError;
    pub use crate::init::{sir_head_mapper, InMemoryRows, InitialData, RowMapper};
    pub use crate::model::{SirCell, SirModel};
    pub use crate::partition::Partition;
    pub use crate::sim::{write_results, GridSimulation, StepSummary};
    pub use crate::topology::{
        BlockAdjacency, BlockLayout, CellId, GridTopology, HaloPlan, LocalTopology,
    };
}
