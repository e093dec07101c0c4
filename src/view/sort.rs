//! Sorting the matrix by strike, expiration or IV at one expiration
//!
//! Sorting never touches the source matrix: it builds a row permutation and
//! a column permutation and reads the source through them into a new matrix.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::{MatrixError, MatrixResult, SurfaceMatrix};

/// What the rows or columns are ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    Strike,
    Expiration,
    /// Rank strikes by their IV in one expiration column
    IvAtExpiration(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }

    /// Arrow for table headers
    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

/// A sort request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn ascending(key: SortKey) -> Self {
        Self::new(key, SortDirection::Ascending)
    }

    pub fn descending(key: SortKey) -> Self {
        Self::new(key, SortDirection::Descending)
    }

    /// Config for a header click: the same key (and column) as before flips
    /// direction, anything else starts ascending.
    pub fn toggled(previous: Option<&SortConfig>, key: SortKey) -> Self {
        match previous {
            Some(prev) if prev.key == key => Self::new(key, prev.direction.reversed()),
            _ => Self::ascending(key),
        }
    }

    /// Column this config ranks by, if any
    pub fn column(&self) -> Option<usize> {
        match self.key {
            SortKey::IvAtExpiration(c) => Some(c),
            _ => None,
        }
    }
}

/// Produce a re-ordered copy of `matrix`.
///
/// Stable in both directions: equal keys keep their original relative order.
pub fn sort(matrix: &SurfaceMatrix, config: &SortConfig) -> MatrixResult<SurfaceMatrix> {
    let (rows, columns) = matrix.dims();
    let mut row_perm: Vec<usize> = (0..rows).collect();
    let mut col_perm: Vec<usize> = (0..columns).collect();
    let dir = config.direction;

    match config.key {
        SortKey::Strike => {
            let strikes = matrix.strikes();
            row_perm.sort_by(|&a, &b| dir.apply(strikes[a].total_cmp(&strikes[b])));
        }
        SortKey::Expiration => {
            let expirations = matrix.expirations();
            col_perm.sort_by(|&a, &b| dir.apply(expirations[a].cmp(&expirations[b])));
        }
        SortKey::IvAtExpiration(column) => {
            if column >= columns {
                return Err(MatrixError::InvalidSortTarget { column, columns });
            }
            let ivs = matrix.ivs();
            row_perm.sort_by(|&a, &b| dir.apply(ivs[[a, column]].total_cmp(&ivs[[b, column]])));
        }
    }

    Ok(permuted(matrix, &row_perm, &col_perm))
}

/// `new[i][j] = old[row_perm[i]][col_perm[j]]`
fn permuted(matrix: &SurfaceMatrix, row_perm: &[usize], col_perm: &[usize]) -> SurfaceMatrix {
    let strikes = row_perm.iter().map(|&i| matrix.strikes()[i]).collect();
    let expirations = col_perm.iter().map(|&j| matrix.expirations()[j]).collect();
    let src = matrix.ivs();
    let ivs = Array2::from_shape_fn((row_perm.len(), col_perm.len()), |(i, j)| {
        src[[row_perm[i], col_perm[j]]]
    });

    SurfaceMatrix::from_parts(
        matrix.contract_type(),
        strikes,
        expirations,
        ivs,
        matrix.underlying_price(),
    )
}
