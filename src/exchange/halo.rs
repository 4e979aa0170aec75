//! Step-boundary halo exchange.
//!
//! Once per step, before the local update, every rank refreshes its ghost
//! table with the peers' previous-step boundary state. All receives are
//! posted before any send: symmetric blocking pairs deadlock as soon as
//! the rank count exceeds two. Tags cycle with the step number so a late
//! message from step k can never match step k+1's receives.

use hashbrown::HashMap;

use crate::comm::wire::{self, WireSirState, SIR_STATE_STRIDE};
use crate::comm::{halo_tag, CommTag, Communicator, Wait};
use crate::error::{EpiGridError, Result};
use crate::model::SirCell;
use crate::topology::{CellId, LocalTopology};

/// Ghost state keyed by global cell id, overwritten every step.
pub type GhostTable = HashMap<CellId, SirCell>;

/// Exchange boundary state with every peer for one step.
///
/// `grid` is the rank's current local state in the local index order of
/// `topo`. On return the ghost table holds exactly the cells of the
/// plan's receive lists, valued at the owners' current state.
pub fn exchange_halo<C: Communicator>(
    comm: &C,
    base: CommTag,
    step: u64,
    topo: &LocalTopology,
    grid: &[SirCell],
    ghosts: &mut GhostTable,
) -> Result<()> {
    let plan = topo.plan();
    let tag = halo_tag(base, step).as_u16();

    // 1) post all receives
    let mut recvs = Vec::with_capacity(plan.peers().len());
    for &peer in plan.peers() {
        let n = plan.recv_list(peer).len();
        if n == 0 {
            continue;
        }
        let mut buf = vec![0u8; n * SIR_STATE_STRIDE];
        recvs.push((peer, n, comm.irecv(peer, tag, &mut buf)));
    }

    // 2) post all sends
    let mut sends = Vec::with_capacity(plan.peers().len());
    for &peer in plan.peers() {
        let list = plan.send_list(peer);
        if list.is_empty() {
            continue;
        }
        let payload: Vec<WireSirState> = list
            .iter()
            .map(|&cell| {
                let idx = topo
                    .index_of(cell)
                    .expect("send list references only local cells");
                WireSirState::from_triple(grid[idx].as_triple())
            })
            .collect();
        sends.push(comm.isend(peer, tag, wire::cast_slice(&payload)));
    }

    // 3) wait receives, validate, install
    ghosts.clear();
    for (peer, n, handle) in recvs {
        let raw = handle
            .wait()
            .ok_or_else(|| EpiGridError::comm(peer, format!("halo payload missing at step {step}")))?;
        if raw.len() != n * SIR_STATE_STRIDE {
            return Err(EpiGridError::BufferSizeMismatch {
                neighbor: peer,
                expected: n * SIR_STATE_STRIDE,
                got: raw.len(),
            });
        }
        let states: &[WireSirState] = wire::cast_slice_from(&raw);
        for (&cell, st) in plan.recv_list(peer).iter().zip(states) {
            let state = SirCell::from_normalized(st.s, st.i, st.r).ok_or_else(|| {
                EpiGridError::comm(
                    peer,
                    format!("ghost cell {cell} carried a non-conserved state at step {step}"),
                )
            })?;
            ghosts.insert(cell, state);
        }
    }

    // 4) wait sends
    for h in sends {
        let _ = h.wait();
    }

    Ok(())
}
