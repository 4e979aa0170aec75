//! Initial-condition interface.
//!
//! The core never parses input files. It consumes a row-ordered tabular
//! source through [`InitialData`] plus an injected [`RowMapper`] that
//! turns one row into a `(S, I, R)` state. Only the coordinator holds the
//! source; other ranks receive their rows through the distribution
//! protocol.

use crate::error::Result;
use crate::model::SirCell;
use crate::topology::CellId;

/// Row-ordered view of the initial-condition dataset. Row `i` corresponds
/// to cell id `i`.
pub trait InitialData {
    /// Number of rows (must cover every cell id).
    fn num_rows(&self) -> usize;

    /// Fixed number of values per row.
    fn values_per_row(&self) -> usize;

    /// Row `id`, exactly `values_per_row()` values.
    fn row(&self, id: CellId) -> &[f64];
}

/// Maps one raw row to a cell state. Returning `None` marks the row as
/// unmappable, which is fatal during setup.
pub type RowMapper = fn(&[f64]) -> Option<SirCell>;

/// Default mapper: the first three values of a row are `(S, I, R)`,
/// clamped and renormalized by [`SirCell::new`].
pub fn sir_head_mapper(row: &[f64]) -> Option<SirCell> {
    if row.len() < 3 {
        return None;
    }
    SirCell::new(row[0], row[1], row[2])
}

/// In-memory implementation backed by a flat row-major buffer.
#[derive(Debug, Clone)]
pub struct InMemoryRows {
    width: usize,
    data: Vec<f64>,
}

impl InMemoryRows {
    /// Build from explicit rows; every row must have the same width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if width == 0 {
            return Err(crate::error::EpiGridError::InvalidConfig(
                "initial-condition dataset is empty".into(),
            ));
        }
        let mut data = Vec::with_capacity(rows.len() * width);
        for (id, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(crate::error::EpiGridError::RowWidthMismatch {
                    row: id as CellId,
                    got: row.len(),
                    expected: width,
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { width, data })
    }

}

impl InitialData for InMemoryRows {
    fn num_rows(&self) -> usize {
        self.data.len() / self.width
    }

    fn values_per_row(&self) -> usize {
        self.width
    }

    fn row(&self, id: CellId) -> &[f64] {
        let start = id as usize * self.width;
        &self.data[start..start + self.width]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_checks_width() {
        let err = InMemoryRows::from_rows(vec![vec![1.0, 0.0], vec![0.5]]);
        assert!(err.is_err());
    }

    #[test]
    fn row_access() {
        let d = InMemoryRows::from_rows(vec![vec![1.0, 0.0, 0.0], vec![0.9, 0.1, 0.0]]).unwrap();
        assert_eq!(d.num_rows(), 2);
        assert_eq!(d.values_per_row(), 3);
        assert_eq!(d.row(1), &[0.9, 0.1, 0.0]);
    }

    #[test]
    fn head_mapper_takes_first_three() {
        let c = sir_head_mapper(&[0.8, 0.2, 0.0, 42.0]).unwrap();
        assert!((c.s() - 0.8).abs() < 1e-12);
        assert!(sir_head_mapper(&[1.0, 0.0]).is_none());
    }
}
