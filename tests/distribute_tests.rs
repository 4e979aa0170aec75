//! Setup-distribution protocol over thread-rank worlds.

use std::thread;

use epigrid::comm::{CommTag, Communicator, SetupTags, ThreadComm};
use epigrid::exchange::distribute::{
    broadcast_topology_maps, fetch_initial_states, scatter_block_structure,
};
use epigrid::init::{sir_head_mapper, InMemoryRows};
use epigrid::partition::Partition;
use epigrid::topology::{BlockAdjacency, BlockLayout, GridTopology};

fn world<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(ThreadComm) -> T + Send + Sync + Clone + 'static,
{
    let mut handles = Vec::new();
    for rank in 0..size {
        let f = f.clone();
        handles.push(thread::spawn(move || f(ThreadComm::new(rank, size))));
    }
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn block_structure_reaches_owners() {
    // 4x4 grid, B = 4 -> 4 blocks over 2 ranks
    let tags = SetupTags::from_base(CommTag::new(0x3000));
    let shares = world(2, move |comm| {
        let partition = (comm.rank() == 0).then(|| {
            let layout = BlockLayout::from_block_size(16, 4).unwrap();
            Partition::contiguous(layout, 2).unwrap()
        });
        scatter_block_structure(&comm, tags, partition.as_ref()).unwrap()
    });

    assert_eq!(shares[0].len(), 2);
    assert_eq!(shares[0][&0], vec![0, 1, 2, 3]);
    assert_eq!(shares[0][&1], vec![4, 5, 6, 7]);
    assert_eq!(shares[1].len(), 2);
    assert_eq!(shares[1][&2], vec![8, 9, 10, 11]);
    assert_eq!(shares[1][&3], vec![12, 13, 14, 15]);
}

#[test]
fn empty_ranks_get_empty_shares() {
    // 2x2 grid, B = 1 -> 4 blocks over 6 ranks; ranks 4 and 5 own nothing
    let tags = SetupTags::from_base(CommTag::new(0x3100));
    let shares = world(6, move |comm| {
        let partition = (comm.rank() == 0).then(|| {
            let layout = BlockLayout::from_block_size(4, 1).unwrap();
            Partition::contiguous(layout, 6).unwrap()
        });
        scatter_block_structure(&comm, tags, partition.as_ref()).unwrap()
    });
    for rank in 0..4 {
        assert_eq!(shares[rank].len(), 1);
        assert_eq!(shares[rank][&(rank as u32)], vec![rank as u32]);
    }
    assert!(shares[4].is_empty());
    assert!(shares[5].is_empty());
}

#[test]
fn initial_states_arrive_in_request_order() {
    // rows carry their cell id in the infected slot so misordering shows
    let tags = SetupTags::from_base(CommTag::new(0x3200));
    let states = world(3, move |comm| {
        let partition = (comm.rank() == 0).then(|| {
            let layout = BlockLayout::from_block_size(12, 2).unwrap();
            Partition::contiguous(layout, 3).unwrap()
        });
        let share = scatter_block_structure(&comm, tags, partition.as_ref()).unwrap();
        let source = (comm.rank() == 0).then(|| {
            let rows: Vec<Vec<f64>> = (0..12)
                .map(|id| {
                    let i = id as f64 / 100.0;
                    vec![1.0 - i, i, 0.0]
                })
                .collect();
            InMemoryRows::from_rows(rows).unwrap()
        });
        fetch_initial_states(
            &comm,
            tags,
            &share,
            source.as_ref().map(|s| s as &dyn epigrid::init::InitialData),
            sir_head_mapper,
        )
        .unwrap()
    });

    for (rank, got) in states.iter().enumerate() {
        assert_eq!(got.len(), 4, "rank {rank} owns 4 cells");
        for (&cell, state) in got {
            assert!((state.i() - cell as f64 / 100.0).abs() < 1e-12);
        }
    }
    assert!(states[0].contains_key(&0) && states[0].contains_key(&3));
    assert!(states[1].contains_key(&4) && states[1].contains_key(&7));
    assert!(states[2].contains_key(&8) && states[2].contains_key(&11));
}

#[test]
fn topology_maps_are_replicated() {
    let tags = SetupTags::from_base(CommTag::new(0x3300));
    let grid = GridTopology::new(4, 4).unwrap();
    let layout = BlockLayout::from_block_size(16, 4).unwrap();
    let expected_adj = BlockAdjacency::build(&grid, &layout);
    let expected_owners = Partition::contiguous(layout, 3).unwrap().owners().to_vec();

    let results = world(3, move |comm| {
        let grid = GridTopology::new(4, 4).unwrap();
        let layout = BlockLayout::from_block_size(16, 4).unwrap();
        let root_maps = (comm.rank() == 0).then(|| {
            (
                BlockAdjacency::build(&grid, &layout),
                Partition::contiguous(layout, 3).unwrap().owners().to_vec(),
            )
        });
        broadcast_topology_maps(
            &comm,
            tags,
            root_maps.as_ref().map(|(a, o)| (a, o.as_slice())),
        )
        .unwrap()
    });

    for (adj, owners) in results {
        assert_eq!(adj, expected_adj);
        assert_eq!(owners, expected_owners);
    }
}
