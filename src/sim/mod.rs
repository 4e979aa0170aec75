//! The per-rank simulation: double-buffered integrator, run loop, and
//! result rows.

pub mod engine;
pub mod integrator;
pub mod results;

pub use engine::GridSimulation;
pub use results::{write_results, StepSummary};
