//! Per-step summary rows and the CSV result sink.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::mem::size_of;

use crate::error::Result;

/// One rank's summary of one executed step: simulated time and the mean
/// compartment fractions over its local cells.
///
/// `#[repr(C)]` and `Pod` so the result gather can ship logs as flat
/// `f64` payloads without a packing pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct StepSummary {
    /// Simulated time, `step_index * dt`.
    pub time: f64,
    /// Mean susceptible fraction over local cells.
    pub s_avg: f64,
    /// Mean infected fraction over local cells.
    pub i_avg: f64,
    /// Mean recovered fraction over local cells.
    pub r_avg: f64,
}

/// Byte stride of one summary row on the wire.
pub const SUMMARY_STRIDE: usize = size_of::<StepSummary>();

const _: () = assert!(SUMMARY_STRIDE == 32);

/// Write the gathered logs as CSV: header `Rank,Time,S_avg,I_avg,R_avg`,
/// ranks ascending, steps in order within a rank. Coordinator-only.
pub fn write_results<W: Write>(sink: &mut W, per_rank: &[Vec<StepSummary>]) -> Result<()> {
    writeln!(sink, "Rank,Time,S_avg,I_avg,R_avg")?;
    for (rank, rows) in per_rank.iter().enumerate() {
        for row in rows {
            writeln!(
                sink,
                "{},{},{},{},{}",
                rank, row.time, row.s_avg, row.i_avg, row.r_avg
            )?;
        }
    }
    sink.flush()?;
    Ok(())
}
