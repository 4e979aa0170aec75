//! Double-buffered forward-Euler update of the local cells.
//!
//! The update is data-parallel over local cells: neighbor reads go to the
//! previous-step buffer (interior) or the freshly exchanged ghost table
//! (cross-rank), writes go to the next buffer. No within-step cross-cell
//! dependency exists, so iteration order only matters for determinism,
//! and local index order is fixed by the topology.

use crate::error::{EpiGridError, Result};
use crate::exchange::GhostTable;
use crate::model::{SirCell, SirModel};
use crate::topology::{LocalTopology, NeighborRef};

/// Advance every local cell by one step.
///
/// Reads `current`, writes `next` (same length). Returns the number of
/// numerical anomalies: cells whose clamped update could not be
/// renormalized and were reset to their previous state. A ghost id with
/// no table entry means the halo exchange did not run for this step and
/// is a fatal exchange error.
pub fn advance_cells(
    model: &SirModel,
    topo: &LocalTopology,
    current: &[SirCell],
    ghosts: &GhostTable,
    next: &mut [SirCell],
) -> Result<u64> {
    debug_assert_eq!(current.len(), next.len());
    let mut anomalies = 0u64;

    for idx in 0..current.len() {
        let cell = current[idx];

        let mut i_sum = 0.0;
        let mut n_nbrs = 0usize;
        for nbr in topo.neighbor_refs(idx) {
            let i = match *nbr {
                NeighborRef::Interior(j) => current[j].i(),
                NeighborRef::Ghost(id) => {
                    ghosts
                        .get(&id)
                        .ok_or_else(|| {
                            EpiGridError::comm(
                                topo.ghost_owner().get(&id).copied().unwrap_or(usize::MAX),
                                format!("ghost cell {id} not present at update time"),
                            )
                        })?
                        .i()
                }
            };
            i_sum += i;
            n_nbrs += 1;
        }
        let i_mean = if n_nbrs > 0 {
            i_sum / n_nbrs as f64
        } else {
            0.0
        };

        let (s, i, r) = (cell.s(), cell.i(), cell.r());
        let i_eff = model.i_eff(i, i_mean);
        let s_new = (s + model.dt * model.ds_dt(s, i, r, i_eff)).clamp(0.0, 1.0);
        let i_new = (i + model.dt * model.di_dt(s, i, r, i_eff)).clamp(0.0, 1.0);
        let r_new = (r + model.dt * model.dr_dt(s, i, r, i_eff)).clamp(0.0, 1.0);

        let total = s_new + i_new + r_new;
        let renormalized = if total > 0.0 {
            SirCell::from_normalized(s_new / total, i_new / total, r_new / total)
        } else {
            None
        };
        next[idx] = match renormalized {
            Some(updated) => updated,
            None => {
                anomalies += 1;
                cell
            }
        };
    }
    Ok(anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CONSERVATION_TOL;
    use crate::topology::{BlockLayout, GridTopology};
    use hashbrown::HashMap;

    fn serial_topo(rows: usize, cols: usize) -> LocalTopology {
        let grid = GridTopology::new(rows, cols).unwrap();
        let n = grid.num_cells();
        let layout = BlockLayout::from_block_size(n, n).unwrap();
        let mut share = HashMap::new();
        share.insert(0u32, (0..n as u32).collect());
        LocalTopology::build(&grid, &layout, &[0], &share, 0).unwrap()
    }

    #[test]
    fn disease_free_grid_is_a_fixed_point() {
        let topo = serial_topo(4, 4);
        let model = SirModel::new(0.3, 0.1, 0.1, 1);
        let current = vec![SirCell::susceptible(); 16];
        let mut next = vec![SirCell::default(); 16];
        let anomalies =
            advance_cells(&model, &topo, &current, &GhostTable::new(), &mut next).unwrap();
        assert_eq!(anomalies, 0);
        assert_eq!(next, current);
    }

    #[test]
    fn infection_spreads_to_neighbors() {
        let topo = serial_topo(3, 3);
        let model = SirModel::new(0.8, 0.05, 0.1, 1);
        let mut current = vec![SirCell::susceptible(); 9];
        current[4] = SirCell::new(0.5, 0.5, 0.0).unwrap();
        let mut next = vec![SirCell::default(); 9];
        advance_cells(&model, &topo, &current, &GhostTable::new(), &mut next).unwrap();
        // the seed's direct neighbors pick up infection pressure
        assert!(next[1].i() > 0.0);
        assert!(next[3].i() > 0.0);
        // the far corner only sees susceptible neighbors this step
        assert_eq!(next[0].i(), 0.0);
        for cell in &next {
            assert!(cell.is_conserved(CONSERVATION_TOL));
        }
    }

    #[test]
    fn missing_ghost_is_fatal() {
        let grid = GridTopology::new(1, 2).unwrap();
        let layout = BlockLayout::from_block_size(2, 1).unwrap();
        let mut share = HashMap::new();
        share.insert(0u32, vec![0u32]);
        let topo = LocalTopology::build(&grid, &layout, &[0, 1], &share, 0).unwrap();
        let model = SirModel::new(0.3, 0.1, 0.1, 1);
        let current = vec![SirCell::susceptible()];
        let mut next = vec![SirCell::default()];
        let err = advance_cells(&model, &topo, &current, &GhostTable::new(), &mut next);
        assert!(err.is_err());
    }
}
