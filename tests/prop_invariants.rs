//! Property tests for the partition and conservation contracts.

use proptest::prelude::*;

use epigrid::model::{SirCell, CONSERVATION_TOL};
use epigrid::partition::Partition;
use epigrid::topology::{BlockAdjacency, BlockLayout, GridTopology};

proptest! {
    /// Every cell lands in exactly one block and every rank's share is
    /// within one block of the even split.
    #[test]
    fn partition_is_exact_and_balanced(
        cells in 1usize..600,
        block_size in 1usize..48,
        ranks in 1usize..9,
    ) {
        let layout = BlockLayout::from_block_size(cells, block_size).unwrap();
        let partition = Partition::contiguous(layout, ranks).unwrap();

        let mut seen = vec![0u32; cells];
        for b in 0..layout.num_blocks() as u32 {
            for c in layout.cells_of(b) {
                seen[c as usize] += 1;
            }
        }
        prop_assert!(seen.iter().all(|&n| n == 1));

        let q = layout.num_blocks() / ranks;
        let mut total = 0;
        for rank in 0..ranks {
            let share = partition.blocks_of(rank).len();
            prop_assert!(share == q || share == q + 1);
            total += share;
        }
        prop_assert_eq!(total, layout.num_blocks());
    }

    /// `block_of` inverts `cells_of` for every cell.
    #[test]
    fn block_lookup_inverts_membership(
        cells in 1usize..600,
        block_size in 1usize..48,
    ) {
        let layout = BlockLayout::from_block_size(cells, block_size).unwrap();
        for b in 0..layout.num_blocks() as u32 {
            for c in layout.cells_of(b) {
                prop_assert_eq!(layout.block_of(c), b);
            }
        }
    }

    /// Block adjacency is symmetric and never self-looping.
    #[test]
    fn block_adjacency_is_symmetric(
        rows in 1usize..12,
        cols in 1usize..12,
        block_size in 1usize..20,
    ) {
        let grid = GridTopology::new(rows, cols).unwrap();
        let layout = BlockLayout::from_block_size(grid.num_cells(), block_size).unwrap();
        let adj = BlockAdjacency::build(&grid, &layout);
        prop_assert_eq!(adj.num_blocks(), layout.num_blocks());
        for (b, nbrs) in adj.entries() {
            for &n in nbrs {
                prop_assert!(n != b);
                prop_assert!(adj.neighbors_of(n).contains(&b));
            }
        }
    }

    /// Any finite input either normalizes to a conserved state or is
    /// rejected outright.
    #[test]
    fn cell_constructor_conserves(
        s in -2.0f64..3.0,
        i in -2.0f64..3.0,
        r in -2.0f64..3.0,
    ) {
        if let Some(cell) = SirCell::new(s, i, r) {
            prop_assert!(cell.is_conserved(CONSERVATION_TOL));
        } else {
            // rejected only when nothing remains after clamping
            prop_assert!(s.clamp(0.0, 1.0) + i.clamp(0.0, 1.0) + r.clamp(0.0, 1.0) <= 0.0);
        }
    }
}
