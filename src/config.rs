//! Validated runtime parameters for one simulation run.
//!
//! Every rank constructs the same `RunConfig` from the same inputs
//! (SPMD), so deterministic quantities derived from it, such as the grid,
//! the block layout, and the owner assignment rule, can be recomputed locally
//! instead of being shipped.

use serde::{Deserialize, Serialize};

use crate::error::{EpiGridError, Result};
use crate::model::SirModel;
use crate::topology::GridTopology;

/// Parameters shared by every rank of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Target cells per block.
    pub block_size: usize,
    /// Transmission rate beta.
    pub beta: f64,
    /// Recovery rate gamma.
    pub gamma: f64,
    /// Step size.
    pub dt: f64,
    /// Total simulated steps.
    pub steps: usize,
    /// Neighbor mixing weight in `[0, 1]`.
    pub mixing: f64,
}

impl RunConfig {
    /// Total cell count.
    pub fn num_cells(&self) -> usize {
        self.rows * self.cols
    }

    /// The immutable model parameters of this run.
    pub fn model(&self) -> SirModel {
        SirModel::new(self.beta, self.gamma, self.dt, self.steps).with_mixing(self.mixing)
    }

    /// Reject configurations before any collective runs.
    pub fn validate(&self) -> Result<()> {
        GridTopology::new(self.rows, self.cols)?;
        if self.block_size == 0 {
            return Err(EpiGridError::InvalidConfig(
                "block size must be at least 1".into(),
            ));
        }
        self.model().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RunConfig {
        RunConfig {
            rows: 4,
            cols: 4,
            block_size: 4,
            beta: 0.3,
            gamma: 0.1,
            dt: 0.1,
            steps: 10,
            mixing: 0.5,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn bad_dimensions_rejected() {
        let mut c = base();
        c.rows = 0;
        assert!(matches!(
            c.validate(),
            Err(EpiGridError::EmptyGrid { rows: 0, cols: 4 })
        ));
    }

    #[test]
    fn bad_rates_rejected() {
        let mut c = base();
        c.gamma = -1.0;
        assert!(c.validate().is_err());
        let mut c = base();
        c.block_size = 0;
        assert!(c.validate().is_err());
    }
}
