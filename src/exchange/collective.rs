//! Rooted collectives built from nonblocking point-to-point pairs.
//!
//! The backends expose only `isend`/`irecv`, so gather, gatherv, scatterv,
//! and broadcast are spelled out here once and reused by the setup and
//! result protocols. Every collective takes the coordinator rank as
//! `root`; with a single rank they degenerate to local moves without
//! touching the communicator.
//!
//! Variable-length transfers are two messages on the same tag: an 8-byte
//! length, then the payload. Per-pair FIFO ordering makes the pairing
//! unambiguous, and the receiver can post an exactly-sized buffer for the
//! second message.

use crate::comm::{CommTag, Communicator, Wait};
use crate::error::{EpiGridError, Result};

fn send_len_prefixed<C: Communicator>(
    comm: &C,
    peer: usize,
    tag: CommTag,
    payload: &[u8],
) -> (C::SendHandle, C::SendHandle) {
    let len = (payload.len() as u64).to_le_bytes();
    let h_len = comm.isend(peer, tag.as_u16(), &len);
    let h_pay = comm.isend(peer, tag.as_u16(), payload);
    (h_len, h_pay)
}

fn recv_len_prefixed<C: Communicator>(comm: &C, peer: usize, tag: CommTag) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 8];
    let raw = comm
        .irecv(peer, tag.as_u16(), &mut len_buf)
        .wait()
        .ok_or_else(|| EpiGridError::comm(peer, "length prefix not received"))?;
    if raw.len() != 8 {
        return Err(EpiGridError::BufferSizeMismatch {
            neighbor: peer,
            expected: 8,
            got: raw.len(),
        });
    }
    len_buf.copy_from_slice(&raw);
    let len = u64::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    let payload = comm
        .irecv(peer, tag.as_u16(), &mut buf)
        .wait()
        .ok_or_else(|| EpiGridError::comm(peer, "payload not received"))?;
    if payload.len() != len {
        return Err(EpiGridError::BufferSizeMismatch {
            neighbor: peer,
            expected: len,
            got: payload.len(),
        });
    }
    Ok(payload)
}

/// Broadcast a byte buffer from `root` to every rank. The root passes
/// `Some(payload)` and gets a copy back; receivers pass `None`.
pub fn broadcast_bytes<C: Communicator>(
    comm: &C,
    root: usize,
    tag: CommTag,
    payload: Option<&[u8]>,
) -> Result<Vec<u8>> {
    if comm.rank() == root {
        let payload = payload.expect("root must provide the broadcast payload");
        let mut pending = Vec::with_capacity(2 * (comm.size() - 1));
        for peer in (0..comm.size()).filter(|&p| p != root) {
            let (a, b) = send_len_prefixed(comm, peer, tag, payload);
            pending.push(a);
            pending.push(b);
        }
        for h in pending {
            let _ = h.wait();
        }
        Ok(payload.to_vec())
    } else {
        recv_len_prefixed(comm, root, tag)
    }
}

/// Gather one `u64` per rank to `root`. Returns `Some(values)` indexed by
/// rank at the root, `None` elsewhere.
pub fn gather_u64<C: Communicator>(
    comm: &C,
    root: usize,
    tag: CommTag,
    value: u64,
) -> Result<Option<Vec<u64>>> {
    if comm.rank() == root {
        let mut handles = Vec::new();
        for peer in (0..comm.size()).filter(|&p| p != root) {
            let mut buf = [0u8; 8];
            handles.push((peer, comm.irecv(peer, tag.as_u16(), &mut buf)));
        }
        let mut out = vec![0u64; comm.size()];
        out[root] = value;
        for (peer, h) in handles {
            let raw = h
                .wait()
                .ok_or_else(|| EpiGridError::comm(peer, "gather value not received"))?;
            if raw.len() != 8 {
                return Err(EpiGridError::BufferSizeMismatch {
                    neighbor: peer,
                    expected: 8,
                    got: raw.len(),
                });
            }
            let mut b = [0u8; 8];
            b.copy_from_slice(&raw);
            out[peer] = u64::from_le_bytes(b);
        }
        Ok(Some(out))
    } else {
        let h = comm.isend(root, tag.as_u16(), &value.to_le_bytes());
        let _ = h.wait();
        Ok(None)
    }
}

/// Variable-length gather (gatherv): every rank contributes a byte buffer,
/// the root receives all of them indexed by rank. `counts` must be the
/// per-rank byte counts previously collected with [`gather_u64`]; only the
/// root reads it.
pub fn gather_bytes<C: Communicator>(
    comm: &C,
    root: usize,
    tag: CommTag,
    mine: &[u8],
    counts: Option<&[u64]>,
) -> Result<Option<Vec<Vec<u8>>>> {
    if comm.rank() == root {
        let counts = counts.expect("root must provide per-rank byte counts");
        let mut handles = Vec::new();
        for peer in (0..comm.size()).filter(|&p| p != root) {
            let mut buf = vec![0u8; counts[peer] as usize];
            handles.push((peer, comm.irecv(peer, tag.as_u16(), &mut buf)));
        }
        let mut out = vec![Vec::new(); comm.size()];
        out[root] = mine.to_vec();
        for (peer, h) in handles {
            let raw = h
                .wait()
                .ok_or_else(|| EpiGridError::comm(peer, "gatherv payload not received"))?;
            if raw.len() != counts[peer] as usize {
                return Err(EpiGridError::BufferSizeMismatch {
                    neighbor: peer,
                    expected: counts[peer] as usize,
                    got: raw.len(),
                });
            }
            out[peer] = raw;
        }
        Ok(Some(out))
    } else {
        let h = comm.isend(root, tag.as_u16(), mine);
        let _ = h.wait();
        Ok(None)
    }
}

/// Variable-length scatter (scatterv): the root passes one byte buffer per
/// rank and keeps its own share; every other rank receives exactly
/// `my_len` bytes, negotiated beforehand.
pub fn scatter_bytes<C: Communicator>(
    comm: &C,
    root: usize,
    tag: CommTag,
    parts: Option<&[Vec<u8>]>,
    my_len: usize,
) -> Result<Vec<u8>> {
    if comm.rank() == root {
        let parts = parts.expect("root must provide per-rank payloads");
        debug_assert_eq!(parts.len(), comm.size(), "one payload per rank");
        let mut pending = Vec::new();
        for peer in (0..comm.size()).filter(|&p| p != root) {
            pending.push(comm.isend(peer, tag.as_u16(), &parts[peer]));
        }
        for h in pending {
            let _ = h.wait();
        }
        Ok(parts[root].clone())
    } else {
        let mut buf = vec![0u8; my_len];
        let raw = comm
            .irecv(root, tag.as_u16(), &mut buf)
            .wait()
            .ok_or_else(|| EpiGridError::comm(root, "scatterv payload not received"))?;
        if raw.len() != my_len {
            return Err(EpiGridError::BufferSizeMismatch {
                neighbor: root,
                expected: my_len,
                got: raw.len(),
            });
        }
        Ok(raw)
    }
}
