//! Fixed little-endian wire records for the setup and halo protocols.
//!
//! Structural integers (counts, ids, ranks) travel as explicit-LE `i32`;
//! state payloads travel as `Pod`-cast `f64` records. Receivers validate
//! byte lengths against negotiated sizes before casting.

use bytemuck::{Pod, Zeroable};
use std::mem::size_of;

use crate::error::{EpiGridError, Result};

/// Cast a `Pod` slice to bytes.
pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Cast bytes to a `Pod` slice; caller must have validated the length.
pub fn cast_slice_from<T: Pod>(v: &[u8]) -> &[T] {
    bytemuck::cast_slice(v)
}

/// Sentinel size terminating a rank's block-structure stream.
pub const BLOCK_STREAM_END: i32 = -1;

/// A structural integer (count, id, or rank) carried on the wire.
#[repr(transparent)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireInt {
    v_le: i32,
}

impl WireInt {
    /// Encode a host integer.
    #[inline]
    pub fn new(v: i32) -> Self {
        Self { v_le: v.to_le() }
    }

    /// Decode to a host integer.
    #[inline]
    pub fn get(&self) -> i32 {
        i32::from_le(self.v_le)
    }
}

/// Encode a run of structural integers.
pub fn encode_ints(vals: &[i32]) -> Vec<u8> {
    let wired: Vec<WireInt> = vals.iter().map(|&v| WireInt::new(v)).collect();
    cast_slice(&wired).to_vec()
}

/// Decode a byte buffer into structural integers, rejecting lengths that
/// are not a whole number of records.
pub fn decode_ints(bytes: &[u8]) -> Result<Vec<i32>> {
    if bytes.len() % size_of::<WireInt>() != 0 {
        return Err(EpiGridError::NonDivisiblePayload {
            bytes: bytes.len(),
            stride: size_of::<WireInt>(),
        });
    }
    Ok(cast_slice_from::<WireInt>(bytes)
        .iter()
        .map(WireInt::get)
        .collect())
}

/// One cell's `(S, I, R)` triple as halo payload.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireSirState {
    /// Susceptible fraction.
    pub s: f64,
    /// Infected fraction.
    pub i: f64,
    /// Recovered fraction.
    pub r: f64,
}

impl WireSirState {
    /// Build from a `(s, i, r)` triple.
    #[inline]
    pub fn from_triple(t: [f64; 3]) -> Self {
        Self {
            s: t[0],
            i: t[1],
            r: t[2],
        }
    }
}

/// Byte stride of one halo record.
pub const SIR_STATE_STRIDE: usize = size_of::<WireSirState>();

// Compile-time layout guards: these sizes are part of the wire contract.
const _: () = {
    assert!(size_of::<WireInt>() == 4);
    assert!(size_of::<WireSirState>() == 24);
};
