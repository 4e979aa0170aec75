//! Global step parameters and the well-mixed SIR rate law.

use serde::{Deserialize, Serialize};

use crate::error::{EpiGridError, Result};

/// Immutable parameters of one simulation run.
///
/// The rate law is the well-mixed SIR system with a neighbor-coupled
/// effective infection pressure:
///
/// ```text
/// dS/dt = -beta * S * I_eff
/// dI/dt =  beta * S * I_eff - gamma * I
/// dR/dt =  gamma * I
/// ```
///
/// where `I_eff = (1 - w) * I_self + w * mean(I_neighbors)` and `w` is the
/// `mixing` weight. Integration is forward Euler with fixed `dt`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SirModel {
    /// Transmission rate beta.
    pub beta: f64,
    /// Recovery rate gamma.
    pub gamma: f64,
    /// Fixed step size.
    pub dt: f64,
    /// Total number of simulated steps.
    pub steps: usize,
    /// Neighbor mixing weight `w` in `[0, 1]`.
    pub mixing: f64,
}

impl SirModel {
    /// Default neighbor mixing weight.
    pub const DEFAULT_MIXING: f64 = 0.5;

    /// Construct with the default mixing weight.
    pub fn new(beta: f64, gamma: f64, dt: f64, steps: usize) -> Self {
        Self {
            beta,
            gamma,
            dt,
            steps,
            mixing: Self::DEFAULT_MIXING,
        }
    }

    /// Override the neighbor mixing weight.
    pub fn with_mixing(mut self, mixing: f64) -> Self {
        self.mixing = mixing;
        self
    }

    /// Reject parameter sets the integrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.beta < 0.0 || !self.beta.is_finite() {
            return Err(EpiGridError::InvalidConfig(format!(
                "transmission rate must be finite and >= 0, got {}",
                self.beta
            )));
        }
        if self.gamma < 0.0 || !self.gamma.is_finite() {
            return Err(EpiGridError::InvalidConfig(format!(
                "recovery rate must be finite and >= 0, got {}",
                self.gamma
            )));
        }
        if self.dt <= 0.0 || !self.dt.is_finite() {
            return Err(EpiGridError::InvalidConfig(format!(
                "step size must be finite and > 0, got {}",
                self.dt
            )));
        }
        if !(0.0..=1.0).contains(&self.mixing) {
            return Err(EpiGridError::InvalidConfig(format!(
                "mixing weight must be in [0, 1], got {}",
                self.mixing
            )));
        }
        Ok(())
    }

    /// Effective infection pressure from the cell's own infected fraction
    /// and the mean infected fraction of its neighbors.
    #[inline]
    pub fn i_eff(&self, i_self: f64, i_neighbor_mean: f64) -> f64 {
        (1.0 - self.mixing) * i_self + self.mixing * i_neighbor_mean
    }

    /// dS/dt at the given state and pressure.
    #[inline]
    pub fn ds_dt(&self, s: f64, _i: f64, _r: f64, i_eff: f64) -> f64 {
        -self.beta * s * i_eff
    }

    /// dI/dt at the given state and pressure.
    #[inline]
    pub fn di_dt(&self, s: f64, i: f64, _r: f64, i_eff: f64) -> f64 {
        self.beta * s * i_eff - self.gamma * i
    }

    /// dR/dt at the given state and pressure.
    #[inline]
    pub fn dr_dt(&self, _s: f64, i: f64, _r: f64, _i_eff: f64) -> f64 {
        self.gamma * i
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_conserve_total_population() {
        let m = SirModel::new(0.5, 0.1, 0.1, 10);
        let (s, i, r) = (0.7, 0.2, 0.1);
        let p = m.i_eff(i, 0.05);
        let total = m.ds_dt(s, i, r, p) + m.di_dt(s, i, r, p) + m.dr_dt(s, i, r, p);
        assert!(total.abs() < 1e-15);
    }

    #[test]
    fn pressure_interpolates() {
        let m = SirModel::new(0.3, 0.1, 0.1, 1).with_mixing(0.25);
        assert!((m.i_eff(0.4, 0.8) - (0.75 * 0.4 + 0.25 * 0.8)).abs() < 1e-15);
    }

    #[test]
    fn zero_mixing_ignores_neighbors() {
        let m = SirModel::new(0.3, 0.1, 0.1, 1).with_mixing(0.0);
        assert_eq!(m.i_eff(0.4, 0.9), 0.4);
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        assert!(SirModel::new(-0.1, 0.1, 0.1, 1).validate().is_err());
        assert!(SirModel::new(0.3, 0.1, 0.0, 1).validate().is_err());
        assert!(SirModel::new(0.3, 0.1, 0.1, 1)
            .with_mixing(1.5)
            .validate()
            .is_err());
        assert!(SirModel::new(0.3, 0.1, 0.1, 1).validate().is_ok());
    }
}
