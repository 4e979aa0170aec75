//! Block layout and block-level adjacency.
//!
//! Blocks are contiguous runs of cell ids, so the cell→block mapping is a
//! division every rank can evaluate locally from `(num_cells, block_size)`
//! without holding the full partition. The block adjacency graph is derived
//! from cell adjacency and replicated to every rank during distribution.

use std::collections::BTreeSet;

use crate::error::{EpiGridError, Result};
use crate::topology::{BlockId, CellId, GridTopology, Rank};

/// Deterministic contiguous block layout over the dense cell id space.
///
/// Block `j` owns cells `[j*B, min((j+1)*B, C))`. Every block is nonempty;
/// the last block may be short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    num_cells: usize,
    block_size: usize,
    num_blocks: usize,
}

impl BlockLayout {
    /// Layout from a target block size `B`; `num_blocks = ceil(C / B)`.
    pub fn from_block_size(num_cells: usize, block_size: usize) -> Result<Self> {
        if num_cells == 0 {
            return Err(EpiGridError::InvalidConfig(
                "cannot partition zero cells".into(),
            ));
        }
        if block_size == 0 {
            return Err(EpiGridError::InvalidConfig(
                "block size must be at least 1".into(),
            ));
        }
        Ok(Self {
            num_cells,
            block_size,
            num_blocks: num_cells.div_ceil(block_size),
        })
    }

    /// Layout from a target block count `K`; the realized count may be
    /// smaller when `C` does not divide evenly.
    pub fn from_block_count(num_cells: usize, target_blocks: usize) -> Result<Self> {
        if target_blocks == 0 {
            return Err(EpiGridError::InvalidConfig(
                "block count must be at least 1".into(),
            ));
        }
        let block_size = num_cells.max(1).div_ceil(target_blocks);
        Self::from_block_size(num_cells, block_size)
    }

    /// Total cell count.
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Target block size `B`.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Cell id range owned by block `b`.
    #[inline]
    pub fn cells_of(&self, b: BlockId) -> std::ops::Range<CellId> {
        let start = (b as usize * self.block_size).min(self.num_cells);
        let end = ((b as usize + 1) * self.block_size).min(self.num_cells);
        start as CellId..end as CellId
    }

    /// Owning block of a cell.
    #[inline]
    pub fn block_of(&self, c: CellId) -> BlockId {
        (c as usize / self.block_size) as BlockId
    }
}

/// Block-level adjacency: for every block, the sorted set of distinct
/// blocks sharing at least one cell-adjacency edge with it.
///
/// Isolated blocks are present with an empty neighbor list; there are no
/// self-loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAdjacency {
    nbrs: Vec<Vec<BlockId>>,
}

impl BlockAdjacency {
    /// Derive block adjacency from cell adjacency and the block layout.
    pub fn build(grid: &GridTopology, layout: &BlockLayout) -> Self {
        let mut sets: Vec<BTreeSet<BlockId>> = vec![BTreeSet::new(); layout.num_blocks()];
        for cell in 0..grid.num_cells() as CellId {
            let home = layout.block_of(cell);
            for nbr in grid.neighbors(cell) {
                let other = layout.block_of(nbr);
                if other != home {
                    sets[home as usize].insert(other);
                }
            }
        }
        Self {
            nbrs: sets
                .into_iter()
                .map(|s| s.into_iter().collect())
                .collect(),
        }
    }

    /// Rebuild from `(block, neighbors)` entries received off the wire.
    /// Entries must cover the dense block id range exactly once.
    pub fn from_entries(num_blocks: usize, entries: Vec<(BlockId, Vec<BlockId>)>) -> Result<Self> {
        let mut nbrs: Vec<Option<Vec<BlockId>>> = vec![None; num_blocks];
        for (b, list) in entries {
            let slot = nbrs
                .get_mut(b as usize)
                .ok_or_else(|| EpiGridError::InvalidConfig(format!("block id {b} out of range")))?;
            if slot.is_some() {
                return Err(EpiGridError::InvalidConfig(format!(
                    "duplicate adjacency entry for block {b}"
                )));
            }
            *slot = Some(list);
        }
        let nbrs = nbrs
            .into_iter()
            .enumerate()
            .map(|(b, v)| {
                v.ok_or_else(|| EpiGridError::InvalidConfig(format!("missing adjacency entry for block {b}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { nbrs })
    }

    /// Number of blocks covered.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.nbrs.len()
    }

    /// Sorted neighbor blocks of `b`.
    #[inline]
    pub fn neighbors_of(&self, b: BlockId) -> &[BlockId] {
        &self.nbrs[b as usize]
    }

    /// Iterate `(block, neighbors)` in block order.
    pub fn entries(&self) -> impl Iterator<Item = (BlockId, &[BlockId])> {
        self.nbrs
            .iter()
            .enumerate()
            .map(|(b, v)| (b as BlockId, v.as_slice()))
    }

    /// Foreign ranks this rank must import ghost state from, derived by
    /// composing block adjacency with the owner map.
    pub fn peer_ranks(&self, owners: &[Rank], my_rank: Rank) -> Vec<Rank> {
        let mut peers = BTreeSet::new();
        for (b, nbrs) in self.entries() {
            if owners[b as usize] != my_rank {
                continue;
            }
            for &n in nbrs {
                let owner = owners[n as usize];
                if owner != my_rank {
                    peers.insert(owner);
                }
            }
        }
        peers.into_iter().collect()
    }
}
