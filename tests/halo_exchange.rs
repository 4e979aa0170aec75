//! Step-boundary halo exchange over thread-rank worlds.

use std::thread;

use epigrid::comm::{CommTag, ThreadComm};
use epigrid::exchange::halo::exchange_halo;
use epigrid::exchange::GhostTable;
use epigrid::model::SirCell;
use epigrid::topology::{BlockLayout, GridTopology, LocalTopology};
use hashbrown::HashMap;

/// 2x2 grid, two blocks of two cells, rank 0 owns {0,1}, rank 1 owns {2,3}.
fn two_rank_topo(my_rank: usize) -> LocalTopology {
    let grid = GridTopology::new(2, 2).unwrap();
    let layout = BlockLayout::from_block_size(4, 2).unwrap();
    let owners = vec![0, 1];
    let mut share = HashMap::new();
    if my_rank == 0 {
        share.insert(0u32, vec![0u32, 1]);
    } else {
        share.insert(1u32, vec![2u32, 3]);
    }
    LocalTopology::build(&grid, &layout, &owners, &share, my_rank).unwrap()
}

fn state(i: f64) -> SirCell {
    SirCell::new(1.0 - i, i, 0.0).unwrap()
}

#[test]
fn symmetric_two_peer_exchange() {
    let base = CommTag::new(0x3800);
    let mut handles = Vec::new();
    for rank in 0..2usize {
        handles.push(thread::spawn(move || {
            let comm = ThreadComm::new(rank, 2);
            let topo = two_rank_topo(rank);
            // distinct dyadic infected fractions so equality checks are bit-exact
            let grid: Vec<SirCell> = topo
                .cells()
                .iter()
                .map(|&c| state(c as f64 / 4.0))
                .collect();
            let mut ghosts = GhostTable::new();
            exchange_halo(&comm, base, 0, &topo, &grid, &mut ghosts).unwrap();
            ghosts
        }));
    }
    let tables: Vec<GhostTable> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // each direction carried exactly 2 triples
    assert_eq!(tables[0].len(), 2);
    assert_eq!(tables[1].len(), 2);
    for k in [2u32, 3] {
        assert_eq!(tables[0][&k], state(k as f64 / 4.0));
    }
    for k in [0u32, 1] {
        assert_eq!(tables[1][&k], state(k as f64 / 4.0));
    }
}

#[test]
fn ghosts_track_the_owners_latest_state() {
    let base = CommTag::new(0x3900);
    let mut handles = Vec::new();
    for rank in 0..2usize {
        handles.push(thread::spawn(move || {
            let comm = ThreadComm::new(rank, 2);
            let topo = two_rank_topo(rank);
            let mut grid: Vec<SirCell> = topo
                .cells()
                .iter()
                .map(|&c| state(c as f64 / 4.0))
                .collect();
            let mut ghosts = GhostTable::new();

            exchange_halo(&comm, base, 0, &topo, &grid, &mut ghosts).unwrap();
            let after_step0: GhostTable = ghosts.clone();

            // pretend a local update happened, then exchange for step 1
            for cell in &mut grid {
                *cell = state(cell.i() / 2.0);
            }
            exchange_halo(&comm, base, 1, &topo, &grid, &mut ghosts).unwrap();
            (after_step0, ghosts)
        }));
    }
    let results: Vec<(GhostTable, GhostTable)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let (step0, step1) = &results[0];
    for k in [2u32, 3] {
        assert_eq!(step0[&k], state(k as f64 / 4.0));
        assert_eq!(step1[&k], state(k as f64 / 8.0));
    }
    let (step0, step1) = &results[1];
    for k in [0u32, 1] {
        assert_eq!(step0[&k], state(k as f64 / 4.0));
        assert_eq!(step1[&k], state(k as f64 / 8.0));
    }
}

#[test]
fn no_peer_exchange_is_a_no_op() {
    let grid = GridTopology::new(2, 2).unwrap();
    let layout = BlockLayout::from_block_size(4, 4).unwrap();
    let mut share = HashMap::new();
    share.insert(0u32, vec![0u32, 1, 2, 3]);
    let topo = LocalTopology::build(&grid, &layout, &[0], &share, 0).unwrap();

    let comm = ThreadComm::new(0, 1);
    let cells: Vec<SirCell> = (0..4).map(|c| state(c as f64 / 4.0)).collect();
    let mut ghosts = GhostTable::new();
    exchange_halo(&comm, CommTag::new(0x3a00), 0, &topo, &cells, &mut ghosts).unwrap();
    assert!(ghosts.is_empty());
}
