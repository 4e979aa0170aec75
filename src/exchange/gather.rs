//! End-of-run result collection.
//!
//! Each rank flattens its summary log into `4 * steps` doubles; a size
//! gather is followed by a gatherv into the coordinator, which splits the
//! buffer back into per-rank logs in rank order.

use crate::comm::wire;
use crate::comm::{CommTag, Communicator};
use crate::error::{EpiGridError, Result};
use crate::sim::results::{StepSummary, SUMMARY_STRIDE};

/// Gather every rank's summary log to rank 0. Returns `Some(logs)`
/// indexed by rank at the coordinator, `None` elsewhere.
pub fn gather_summaries<C: Communicator>(
    comm: &C,
    tag: CommTag,
    log: &[StepSummary],
) -> Result<Option<Vec<Vec<StepSummary>>>> {
    let root = 0;
    let mine = wire::cast_slice(log);

    let counts = super::collective::gather_u64(comm, root, tag, mine.len() as u64)?;
    let gathered = super::collective::gather_bytes(
        comm,
        root,
        tag.offset(1),
        mine,
        counts.as_deref(),
    )?;

    match gathered {
        None => Ok(None),
        Some(per_rank) => {
            let mut out = Vec::with_capacity(per_rank.len());
            for bytes in per_rank {
                if bytes.len() % SUMMARY_STRIDE != 0 {
                    return Err(EpiGridError::NonDivisiblePayload {
                        bytes: bytes.len(),
                        stride: SUMMARY_STRIDE,
                    });
                }
                let rows: &[StepSummary] = wire::cast_slice_from(&bytes);
                out.push(rows.to_vec());
            }
            Ok(Some(out))
        }
    }
}
