//! Collective protocols of the simulation run.
//!
//! Three layers, all generic over [`crate::comm::Communicator`]:
//! rooted collectives ([`collective`]), the one-shot setup distribution
//! ([`distribute`]), the per-step halo exchange ([`halo`]), and the
//! end-of-run result gather ([`gather`]).

pub mod collective;
pub mod distribute;
pub mod gather;
pub mod halo;

pub use distribute::BlockShare;
pub use halo::GhostTable;
