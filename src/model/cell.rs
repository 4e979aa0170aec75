//! One grid cell's `(S, I, R)` compartment state.
//!
//! The three compartments are fractions of the cell population, each in
//! `[0, 1]` and summing to 1 within [`CONSERVATION_TOL`]. Every
//! constructor re-establishes the invariant, so a `SirCell` observed
//! anywhere in the crate is always well-formed.

use serde::{Deserialize, Serialize};

use super::CONSERVATION_TOL;

/// Compartment state of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SirCell {
    s: f64,
    i: f64,
    r: f64,
}

impl SirCell {
    /// Build a cell from raw compartment values, clamping each to `[0, 1]`
    /// and renormalizing so they sum to 1.
    ///
    /// Returns `None` when the clamped values sum to zero or any input is
    /// non-finite; there is no sensible state to normalize to.
    pub fn new(s: f64, i: f64, r: f64) -> Option<Self> {
        if !(s.is_finite() && i.is_finite() && r.is_finite()) {
            return None;
        }
        let s = s.clamp(0.0, 1.0);
        let i = i.clamp(0.0, 1.0);
        let r = r.clamp(0.0, 1.0);
        let sum = s + i + r;
        if sum <= 0.0 {
            return None;
        }
        Some(Self {
            s: s / sum,
            i: i / sum,
            r: r / sum,
        })
    }

    /// Build a cell from values that must already satisfy the invariant,
    /// storing them bit-exactly.
    ///
    /// Used where renormalizing would perturb values that are already
    /// well-formed: installing halo payloads (the ghost copy must equal
    /// the owner's value bitwise) and committing integrator output that
    /// was renormalized in-line. Returns `None` if the invariant does not
    /// hold within [`CONSERVATION_TOL`].
    pub fn from_normalized(s: f64, i: f64, r: f64) -> Option<Self> {
        let cell = Self { s, i, r };
        cell.is_conserved(CONSERVATION_TOL).then_some(cell)
    }

    /// Fully susceptible cell: `(1, 0, 0)`.
    pub const fn susceptible() -> Self {
        Self {
            s: 1.0,
            i: 0.0,
            r: 0.0,
        }
    }

    /// Susceptible fraction.
    #[inline]
    pub fn s(&self) -> f64 {
        self.s
    }

    /// Infected fraction.
    #[inline]
    pub fn i(&self) -> f64 {
        self.i
    }

    /// Recovered fraction.
    #[inline]
    pub fn r(&self) -> f64 {
        self.r
    }

    /// `(s, i, r)` as a flat triple, in wire order.
    #[inline]
    pub fn as_triple(&self) -> [f64; 3] {
        [self.s, self.i, self.r]
    }

    /// Whether the conservation invariant holds within `tol`.
    pub fn is_conserved(&self, tol: f64) -> bool {
        (0.0..=1.0).contains(&self.s)
            && (0.0..=1.0).contains(&self.i)
            && (0.0..=1.0).contains(&self.r)
            && ((self.s + self.i + self.r) - 1.0).abs() <= tol
    }
}

impl Default for SirCell {
    fn default() -> Self {
        Self::susceptible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes() {
        let c = SirCell::new(2.0, 1.0, 1.0).unwrap();
        // clamped to (1, 1, 1), normalized to thirds
        assert!((c.s() - 1.0 / 3.0).abs() < 1e-15);
        assert!(c.is_conserved(CONSERVATION_TOL));
    }

    #[test]
    fn new_clamps_negatives() {
        let c = SirCell::new(-0.5, 0.6, 0.4).unwrap();
        assert_eq!(c.s(), 0.0);
        assert!(c.is_conserved(CONSERVATION_TOL));
    }

    #[test]
    fn degenerate_inputs_rejected() {
        assert!(SirCell::new(0.0, 0.0, 0.0).is_none());
        assert!(SirCell::new(-1.0, -2.0, 0.0).is_none());
        assert!(SirCell::new(f64::NAN, 0.5, 0.5).is_none());
    }

    #[test]
    fn susceptible_is_conserved() {
        assert!(SirCell::susceptible().is_conserved(0.0));
    }

    #[test]
    fn from_normalized_is_bit_exact() {
        let (s, i, r) = (0.7, 0.2, 0.1);
        let c = SirCell::from_normalized(s, i, r).unwrap();
        assert_eq!(c.s().to_bits(), s.to_bits());
        assert!(SirCell::from_normalized(0.7, 0.2, 0.2).is_none());
        assert!(SirCell::from_normalized(-0.1, 0.6, 0.5).is_none());
    }
}
