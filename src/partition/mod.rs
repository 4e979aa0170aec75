//! Deterministic contiguous partitioner.
//!
//! Cells are grouped into contiguous blocks by the [`BlockLayout`] rule and
//! blocks are assigned to ranks in contiguous runs balanced within one
//! block. The assignment is a pure function of `(num_blocks, num_ranks)`,
//! so every rank can reproduce the full owner map locally; the coordinator
//! still scatters explicit block structure so the cell membership contract
//! stays partitioner-agnostic.

use crate::error::{EpiGridError, Result};
use crate::topology::{BlockId, BlockLayout, CellId, Rank};

/// Contiguous run of block ids owned by one rank.
///
/// With `q = num_blocks / P` and `r = num_blocks % P`, rank `i` owns
/// `q + 1` blocks when `i < r`, else `q`, starting at
/// `i*(q+1)` or `i*q + r` respectively. Ranks beyond `num_blocks` own
/// nothing and run the simulation loop as no-ops.
pub fn rank_share(num_blocks: usize, num_ranks: usize, rank: Rank) -> std::ops::Range<BlockId> {
    debug_assert!(rank < num_ranks);
    let q = num_blocks / num_ranks;
    let r = num_blocks % num_ranks;
    let (start, count) = if rank < r {
        (rank * (q + 1), q + 1)
    } else {
        (rank * q + r, q)
    };
    start as BlockId..(start + count) as BlockId
}

/// Full partition: block layout plus the dense block→rank owner map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    layout: BlockLayout,
    num_ranks: usize,
    owners: Vec<Rank>,
}

impl Partition {
    /// Assign the layout's blocks to `num_ranks` ranks contiguously.
    pub fn contiguous(layout: BlockLayout, num_ranks: usize) -> Result<Self> {
        if num_ranks == 0 {
            return Err(EpiGridError::InvalidConfig(
                "need at least one rank".into(),
            ));
        }
        let mut owners = vec![0; layout.num_blocks()];
        for rank in 0..num_ranks {
            for b in rank_share(layout.num_blocks(), num_ranks, rank) {
                owners[b as usize] = rank;
            }
        }
        Ok(Self {
            layout,
            num_ranks,
            owners,
        })
    }

    /// The underlying block layout.
    #[inline]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Rank count this partition was built for.
    #[inline]
    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// Dense block→rank owner map.
    #[inline]
    pub fn owners(&self) -> &[Rank] {
        &self.owners
    }

    /// Owning rank of block `b`.
    #[inline]
    pub fn owner_of_block(&self, b: BlockId) -> Rank {
        self.owners[b as usize]
    }

    /// Owning rank of cell `c` (its block's owner).
    #[inline]
    pub fn owner_of_cell(&self, c: CellId) -> Rank {
        self.owner_of_block(self.layout.block_of(c))
    }

    /// Blocks owned by `rank`, as a contiguous id range.
    pub fn blocks_of(&self, rank: Rank) -> std::ops::Range<BlockId> {
        rank_share(self.layout.num_blocks(), self.num_ranks, rank)
    }

    /// Cell list of one block, materialized for the structure scatter.
    pub fn block_cells(&self, b: BlockId) -> Vec<CellId> {
        self.layout.cells_of(b).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_are_contiguous_and_balanced() {
        for &(blocks, ranks) in &[(16usize, 3usize), (4, 3), (7, 7), (3, 8), (1, 1)] {
            let mut covered = Vec::new();
            let q = blocks / ranks;
            for rank in 0..ranks {
                let share = rank_share(blocks, ranks, rank);
                let count = share.len();
                assert!(count == q || count == q + 1, "{blocks}/{ranks} rank {rank}");
                covered.extend(share);
            }
            assert_eq!(covered, (0..blocks as BlockId).collect::<Vec<_>>());
        }
    }

    #[test]
    fn scenario_four_blocks_three_ranks() {
        // 16 cells, B = 4 -> blocks 0..4; rank 0 owns {0,1}, 1 owns {2}, 2 owns {3}
        let layout = BlockLayout::from_block_size(16, 4).unwrap();
        let p = Partition::contiguous(layout, 3).unwrap();
        assert_eq!(p.blocks_of(0), 0..2);
        assert_eq!(p.blocks_of(1), 2..3);
        assert_eq!(p.blocks_of(2), 3..4);
        assert_eq!(p.owners(), &[0, 0, 1, 2]);
        assert_eq!(p.block_cells(1), vec![4, 5, 6, 7]);
    }

    #[test]
    fn more_ranks_than_blocks_leaves_empty_ranks() {
        let layout = BlockLayout::from_block_size(4, 4).unwrap();
        let p = Partition::contiguous(layout, 8).unwrap();
        assert_eq!(p.blocks_of(0), 0..1);
        for rank in 1..8 {
            assert!(p.blocks_of(rank).is_empty());
        }
    }

    #[test]
    fn cell_owner_follows_block_owner() {
        let layout = BlockLayout::from_block_size(10, 3).unwrap();
        let p = Partition::contiguous(layout, 2).unwrap();
        for c in 0..10u32 {
            assert_eq!(p.owner_of_cell(c), p.owner_of_block(p.layout().block_of(c)));
        }
    }
}
