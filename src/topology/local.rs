//! Per-rank local view: owned cells, classified neighbors, and the halo
//! plan describing what must be exchanged with each peer every step.

use hashbrown::HashMap;

use crate::error::{EpiGridError, Result};
use crate::topology::{BlockId, BlockLayout, CellId, GridTopology, Rank};

/// A neighbor of a local cell, classified at setup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborRef {
    /// Neighbor owned by this rank; payload is its local grid index.
    Interior(usize),
    /// Neighbor owned elsewhere; read from the ghost table by global id.
    Ghost(CellId),
}

/// Per-peer send and receive lists for the step-boundary halo exchange.
///
/// Both sides of a pair derive the same cell set from replicated data:
/// the cells rank A sends to rank B are exactly the A-owned cells adjacent
/// to B-owned cells, which is also what B expects to receive from A. Lists
/// are sorted by global id so zipping ids with payload order is
/// well-defined without any per-message index header.
#[derive(Debug, Clone, Default)]
pub struct HaloPlan {
    peers: Vec<Rank>,
    send: HashMap<Rank, Vec<CellId>>,
    recv: HashMap<Rank, Vec<CellId>>,
}

impl HaloPlan {
    /// Peer ranks in ascending order.
    #[inline]
    pub fn peers(&self) -> &[Rank] {
        &self.peers
    }

    /// Sorted local cells whose state `peer` imports each step.
    pub fn send_list(&self, peer: Rank) -> &[CellId] {
        self.send.get(&peer).map_or(&[], |v| v.as_slice())
    }

    /// Sorted ghost cells this rank imports from `peer` each step.
    pub fn recv_list(&self, peer: Rank) -> &[CellId] {
        self.recv.get(&peer).map_or(&[], |v| v.as_slice())
    }

    /// Total number of ghost cells imported per step.
    pub fn total_recv(&self) -> usize {
        self.recv.values().map(Vec::len).sum()
    }
}

/// Immutable per-rank topology produced by setup.
#[derive(Debug, Clone)]
pub struct LocalTopology {
    cells: Vec<CellId>,
    index_of: HashMap<CellId, usize>,
    neighbors: Vec<Vec<NeighborRef>>,
    ghost_owner: HashMap<CellId, Rank>,
    plan: HaloPlan,
}

impl LocalTopology {
    /// Classify every neighbor of every locally owned cell and derive the
    /// halo plan.
    ///
    /// `owners` is the dense block→rank map (replicated); `local_blocks`
    /// is this rank's share of the block structure as received during
    /// distribution. A rank owning no blocks produces an empty topology
    /// with an empty plan.
    pub fn build(
        grid: &GridTopology,
        layout: &BlockLayout,
        owners: &[Rank],
        local_blocks: &HashMap<BlockId, Vec<CellId>>,
        my_rank: Rank,
    ) -> Result<Self> {
        if owners.len() != layout.num_blocks() {
            return Err(EpiGridError::InvalidConfig(format!(
                "owner map covers {} blocks, layout has {}",
                owners.len(),
                layout.num_blocks()
            )));
        }

        let mut cells: Vec<CellId> = local_blocks.values().flatten().copied().collect();
        cells.sort_unstable();
        cells.dedup();

        let index_of: HashMap<CellId, usize> =
            cells.iter().enumerate().map(|(i, &c)| (c, i)).collect();

        let mut neighbors = Vec::with_capacity(cells.len());
        let mut ghost_owner: HashMap<CellId, Rank> = HashMap::new();
        let mut send: HashMap<Rank, Vec<CellId>> = HashMap::new();
        let mut recv: HashMap<Rank, Vec<CellId>> = HashMap::new();

        for &cell in &cells {
            let mut refs = Vec::with_capacity(4);
            for nbr in grid.neighbors(cell) {
                if let Some(&idx) = index_of.get(&nbr) {
                    refs.push(NeighborRef::Interior(idx));
                } else {
                    let owner = owners[layout.block_of(nbr) as usize];
                    if owner == my_rank {
                        // The owner map says this cell is ours, yet it was
                        // not in any scattered block: the distribution and
                        // the replicated maps disagree.
                        return Err(EpiGridError::InvalidConfig(format!(
                            "cell {nbr} owned by rank {my_rank} missing from its block share"
                        )));
                    }
                    refs.push(NeighborRef::Ghost(nbr));
                    ghost_owner.insert(nbr, owner);
                    send.entry(owner).or_default().push(cell);
                }
            }
            neighbors.push(refs);
        }

        for (&ghost, &owner) in &ghost_owner {
            recv.entry(owner).or_default().push(ghost);
        }
        for list in send.values_mut() {
            list.sort_unstable();
            list.dedup();
        }
        for list in recv.values_mut() {
            list.sort_unstable();
        }

        let mut peers: Vec<Rank> = send.keys().chain(recv.keys()).copied().collect();
        peers.sort_unstable();
        peers.dedup();

        Ok(Self {
            cells,
            index_of,
            neighbors,
            ghost_owner,
            plan: HaloPlan { peers, send, recv },
        })
    }

    /// Locally owned cells in ascending global id order; index in this
    /// slice is the cell's local grid index.
    #[inline]
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    /// Number of locally owned cells.
    #[inline]
    pub fn num_local(&self) -> usize {
        self.cells.len()
    }

    /// Local index of a global id, if owned here.
    #[inline]
    pub fn index_of(&self, cell: CellId) -> Option<usize> {
        self.index_of.get(&cell).copied()
    }

    /// Classified neighbors of the cell at `local_idx`.
    #[inline]
    pub fn neighbor_refs(&self, local_idx: usize) -> &[NeighborRef] {
        &self.neighbors[local_idx]
    }

    /// Owning rank of each ghost cell this rank reads.
    #[inline]
    pub fn ghost_owner(&self) -> &HashMap<CellId, Rank> {
        &self.ghost_owner
    }

    /// The step-boundary exchange plan.
    #[inline]
    pub fn plan(&self) -> &HaloPlan {
        &self.plan
    }
}
