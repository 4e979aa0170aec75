//! Message-passing backends and wire encoding.
//!
//! The simulation core is generic over [`communicator::Communicator`];
//! everything above this module speaks in nonblocking send/receive pairs
//! and byte buffers, so the same protocol code runs serially, across
//! threads in one process, or across MPI ranks.

pub mod communicator;
pub mod wire;

pub use communicator::{
    halo_tag, CommTag, Communicator, NoComm, SetupTags, ThreadComm, Wait, HALO_TAG_CYCLE,
};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
