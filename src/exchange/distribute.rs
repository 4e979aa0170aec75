//! One-shot setup distribution, coordinator-rooted.
//!
//! Three stages, run in order on every rank:
//! 1. block-structure scatter: per-rank streams of
//!    `[block_id, n_cells, cell...]` int records, each preceded by its
//!    size in ints and terminated by a sentinel size of −1;
//! 2. initial-state request/scatter: needed-id gather, row broadcast of
//!    the per-row value count, payload scatterv in request order;
//! 3. topology-metadata broadcast: the block-adjacency and block-owner
//!    maps as length-prefixed int buffers.
//!
//! All decode paths run on every rank including the coordinator, so the
//! wire format is exercised even in single-rank runs.

use std::collections::BTreeSet;

use hashbrown::HashMap;

use crate::comm::wire::{self, BLOCK_STREAM_END};
use crate::comm::{Communicator, SetupTags, Wait};
use crate::error::{EpiGridError, Result};
use crate::init::{InitialData, RowMapper};
use crate::model::SirCell;
use crate::partition::Partition;
use crate::topology::{BlockAdjacency, BlockId, CellId, Rank};

/// A rank's share of the block structure: block id → owned cell list.
pub type BlockShare = HashMap<BlockId, Vec<CellId>>;

/// Stage 1: scatter the block structure. The coordinator passes the full
/// partition; every rank returns its own share.
pub fn scatter_block_structure<C: Communicator>(
    comm: &C,
    tags: SetupTags,
    partition: Option<&Partition>,
) -> Result<BlockShare> {
    let root = 0;
    let tag = tags.blocks.as_u16();

    if comm.rank() == root {
        let partition = partition.expect("coordinator must provide the partition");
        let mut share = BlockShare::new();
        let mut pending = Vec::new();
        for rank in 0..comm.size() {
            for b in partition.blocks_of(rank) {
                let cells = partition.block_cells(b);
                if rank == root {
                    share.insert(b, cells);
                    continue;
                }
                let mut record = Vec::with_capacity(2 + cells.len());
                record.push(b as i32);
                record.push(cells.len() as i32);
                record.extend(cells.iter().map(|&c| c as i32));
                pending.push(comm.isend(rank, tag, &wire::encode_ints(&[record.len() as i32])));
                pending.push(comm.isend(rank, tag, &wire::encode_ints(&record)));
            }
            if rank != root {
                pending.push(comm.isend(rank, tag, &wire::encode_ints(&[BLOCK_STREAM_END])));
            }
        }
        for h in pending {
            let _ = h.wait();
        }
        Ok(share)
    } else {
        let mut share = BlockShare::new();
        loop {
            let mut size_buf = [0u8; 4];
            let raw = comm
                .irecv(root, tag, &mut size_buf)
                .wait()
                .ok_or_else(|| EpiGridError::comm(root, "block record size not received"))?;
            let size = wire::decode_ints(&raw)?;
            let &[size] = size.as_slice() else {
                return Err(EpiGridError::BufferSizeMismatch {
                    neighbor: root,
                    expected: 4,
                    got: raw.len(),
                });
            };
            if size == BLOCK_STREAM_END {
                break;
            }
            if size < 2 {
                return Err(EpiGridError::InvalidWireCount {
                    count: size,
                    from: root,
                });
            }
            let mut buf = vec![0u8; size as usize * 4];
            let raw = comm
                .irecv(root, tag, &mut buf)
                .wait()
                .ok_or_else(|| EpiGridError::comm(root, "block record not received"))?;
            if raw.len() != buf.len() {
                return Err(EpiGridError::BufferSizeMismatch {
                    neighbor: root,
                    expected: buf.len(),
                    got: raw.len(),
                });
            }
            let ints = wire::decode_ints(&raw)?;
            let (block_id, n_cells) = (ints[0], ints[1]);
            if block_id < 0 || n_cells < 0 || n_cells as usize != ints.len() - 2 {
                return Err(EpiGridError::InvalidWireCount {
                    count: n_cells,
                    from: root,
                });
            }
            let cells = ints[2..]
                .iter()
                .map(|&c| {
                    u32::try_from(c).map_err(|_| EpiGridError::InvalidWireCount {
                        count: c,
                        from: root,
                    })
                })
                .collect::<Result<Vec<CellId>>>()?;
            share.insert(block_id as BlockId, cells);
        }
        Ok(share)
    }
}

/// Stage 2: fetch initial cell states for this rank's share.
///
/// Each rank requests its sorted unique cell ids; the coordinator packs
/// the matching rows in request order and scatters them back, after
/// broadcasting the per-row value count. Requested ids come from the
/// partition and are therefore already within `[0, num_cells)`; an id the
/// dataset cannot honor is a fatal distribution error.
pub fn fetch_initial_states<C: Communicator>(
    comm: &C,
    tags: SetupTags,
    share: &BlockShare,
    source: Option<&dyn InitialData>,
    mapper: RowMapper,
) -> Result<HashMap<CellId, SirCell>> {
    let root = 0;

    let needed: Vec<CellId> = share
        .values()
        .flatten()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    // request-count gather, then id gatherv
    let counts = super::collective::gather_u64(comm, root, tags.req_counts, needed.len() as u64)?;
    let id_bytes = wire::encode_ints(&needed.iter().map(|&c| c as i32).collect::<Vec<_>>());
    let byte_counts = counts
        .as_ref()
        .map(|c| c.iter().map(|&n| n * 4).collect::<Vec<u64>>());
    let gathered = super::collective::gather_bytes(
        comm,
        root,
        tags.req_ids,
        &id_bytes,
        byte_counts.as_deref(),
    )?;

    // per-row value count broadcast
    let width_payload = source.map(|s| (s.values_per_row() as u64).to_le_bytes());
    let width_raw = super::collective::broadcast_bytes(
        comm,
        root,
        tags.row_width,
        width_payload.as_ref().map(|b| b.as_slice()),
    )?;
    if width_raw.len() != 8 {
        return Err(EpiGridError::BufferSizeMismatch {
            neighbor: root,
            expected: 8,
            got: width_raw.len(),
        });
    }
    let mut width_buf = [0u8; 8];
    width_buf.copy_from_slice(&width_raw);
    let width = u64::from_le_bytes(width_buf) as usize;
    if width == 0 {
        return Err(EpiGridError::InvalidWireCount {
            count: 0,
            from: root,
        });
    }

    // coordinator packs rows in request order per rank
    let parts = if comm.rank() == root {
        let source = source.expect("coordinator must provide the initial-condition source");
        let gathered = gathered.expect("gatherv returns all requests at the root");
        let mut parts = Vec::with_capacity(comm.size());
        for rank_ids in &gathered {
            let ids = wire::decode_ints(rank_ids)?;
            let mut flat = Vec::with_capacity(ids.len() * width);
            for &id in &ids {
                let id = u32::try_from(id).map_err(|_| EpiGridError::InvalidWireCount {
                    count: id,
                    from: root,
                })?;
                if (id as usize) >= source.num_rows() {
                    return Err(EpiGridError::UnknownCellId(id));
                }
                let row = source.row(id);
                if row.len() != width {
                    return Err(EpiGridError::RowWidthMismatch {
                        row: id,
                        got: row.len(),
                        expected: width,
                    });
                }
                flat.extend_from_slice(row);
            }
            parts.push(wire::cast_slice(&flat).to_vec());
        }
        Some(parts)
    } else {
        None
    };

    let my_len = needed.len() * width * 8;
    let payload = super::collective::scatter_bytes(comm, root, tags.state, parts.as_deref(), my_len)?;

    // unpack in request order
    if payload.len() != my_len {
        return Err(EpiGridError::BufferSizeMismatch {
            neighbor: root,
            expected: my_len,
            got: payload.len(),
        });
    }
    let values: &[f64] = wire::cast_slice_from(&payload);
    let mut states = HashMap::with_capacity(needed.len());
    for (k, &cell) in needed.iter().enumerate() {
        let row = &values[k * width..(k + 1) * width];
        let state = mapper(row).ok_or_else(|| EpiGridError::BadInitialState {
            row: cell,
            reason: format!("mapper rejected row {row:?}"),
        })?;
        states.insert(cell, state);
    }
    Ok(states)
}

fn encode_adjacency(adj: &BlockAdjacency) -> Vec<u8> {
    let mut ints = vec![adj.num_blocks() as i32];
    for (b, nbrs) in adj.entries() {
        ints.push(b as i32);
        ints.push(nbrs.len() as i32);
        ints.extend(nbrs.iter().map(|&n| n as i32));
    }
    wire::encode_ints(&ints)
}

fn decode_adjacency(bytes: &[u8], from: Rank) -> Result<BlockAdjacency> {
    let ints = wire::decode_ints(bytes)?;
    let truncated = EpiGridError::InvalidWireCount { count: -1, from };

    let mut cursor = 0usize;
    let num_entries = *ints.first().ok_or(truncated)?;
    cursor += 1;
    if num_entries < 0 {
        return Err(EpiGridError::InvalidWireCount {
            count: num_entries,
            from,
        });
    }
    let mut entries = Vec::with_capacity(num_entries as usize);
    for _ in 0..num_entries {
        if cursor + 2 > ints.len() {
            return Err(EpiGridError::InvalidWireCount { count: -1, from });
        }
        let (block_id, n_nbrs) = (ints[cursor], ints[cursor + 1]);
        cursor += 2;
        if block_id < 0 || n_nbrs < 0 {
            return Err(EpiGridError::InvalidWireCount {
                count: n_nbrs.min(block_id),
                from,
            });
        }
        let end = cursor + n_nbrs as usize;
        if end > ints.len() {
            return Err(EpiGridError::InvalidWireCount { count: n_nbrs, from });
        }
        let nbrs = ints[cursor..end]
            .iter()
            .map(|&n| {
                u32::try_from(n).map_err(|_| EpiGridError::InvalidWireCount { count: n, from })
            })
            .collect::<Result<Vec<BlockId>>>()?;
        cursor = end;
        entries.push((block_id as BlockId, nbrs));
    }
    if cursor != ints.len() {
        return Err(EpiGridError::InvalidWireCount {
            count: (ints.len() - cursor) as i32,
            from,
        });
    }
    BlockAdjacency::from_entries(num_entries as usize, entries)
}

fn encode_owners(owners: &[Rank]) -> Vec<u8> {
    let mut ints = vec![owners.len() as i32];
    for (b, &rank) in owners.iter().enumerate() {
        ints.push(b as i32);
        ints.push(rank as i32);
    }
    wire::encode_ints(&ints)
}

fn decode_owners(bytes: &[u8], from: Rank) -> Result<Vec<Rank>> {
    let ints = wire::decode_ints(bytes)?;
    let num_entries = *ints.first().ok_or(EpiGridError::InvalidWireCount {
        count: -1,
        from,
    })?;
    if num_entries < 0 || ints.len() != 1 + 2 * num_entries as usize {
        return Err(EpiGridError::InvalidWireCount {
            count: num_entries,
            from,
        });
    }
    let mut owners: Vec<Option<Rank>> = vec![None; num_entries as usize];
    for pair in ints[1..].chunks_exact(2) {
        let (block_id, rank) = (pair[0], pair[1]);
        if block_id < 0 || rank < 0 {
            return Err(EpiGridError::InvalidWireCount {
                count: rank.min(block_id),
                from,
            });
        }
        let slot = owners
            .get_mut(block_id as usize)
            .ok_or(EpiGridError::InvalidWireCount {
                count: block_id,
                from,
            })?;
        if slot.replace(rank as Rank).is_some() {
            return Err(EpiGridError::InvalidWireCount {
                count: block_id,
                from,
            });
        }
    }
    owners
        .into_iter()
        .map(|o| {
            o.ok_or(EpiGridError::InvalidWireCount {
                count: num_entries,
                from,
            })
        })
        .collect()
}

/// Stage 3: broadcast the block-adjacency and block-owner maps. Every
/// rank, the coordinator included, reconstructs both from the wire bytes.
pub fn broadcast_topology_maps<C: Communicator>(
    comm: &C,
    tags: SetupTags,
    maps: Option<(&BlockAdjacency, &[Rank])>,
) -> Result<(BlockAdjacency, Vec<Rank>)> {
    let root = 0;

    let adj_payload = maps.map(|(adj, _)| encode_adjacency(adj));
    let adj_bytes =
        super::collective::broadcast_bytes(comm, root, tags.adjacency, adj_payload.as_deref())?;
    let adjacency = decode_adjacency(&adj_bytes, root)?;

    let owner_payload = maps.map(|(_, owners)| encode_owners(owners));
    let owner_bytes =
        super::collective::broadcast_bytes(comm, root, tags.owners, owner_payload.as_deref())?;
    let owners = decode_owners(&owner_bytes, root)?;

    Ok((adjacency, owners))
}
