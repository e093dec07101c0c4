//! Cell color classification and ATM flags
//!
//! The baseline for a column is the IV of its middle row, a cheap stand-in
//! for at-the-money IV. It is not interpolated at the underlying price.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::core::SurfaceMatrix;

/// |iv - baseline| at or beyond which a cell is strongly colored
pub const STRONG_THRESHOLD: f64 = 0.05;

/// Differences within this of a threshold count as on it
const DIFF_EPSILON: f64 = 1e-9;

/// Strikes within this many dollars of the underlying are near the money
pub const NEAR_ATM_BAND: f64 = 5.0;

/// Strikes within this many dollars of the underlying are at the money
pub const ATM_TOLERANCE: f64 = 0.01;

/// Color intensity relative to the column baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorBucket {
    StrongCold,
    MildCold,
    Neutral,
    MildHot,
    StrongHot,
}

impl ColorBucket {
    /// RGB used by the dashboards
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            ColorBucket::StrongCold => (37, 99, 235),
            ColorBucket::MildCold => (147, 197, 253),
            ColorBucket::Neutral => (229, 231, 235),
            ColorBucket::MildHot => (252, 165, 165),
            ColorBucket::StrongHot => (220, 38, 38),
        }
    }

    /// Dark text on light buckets, light text on strong ones
    pub fn light_text(&self) -> bool {
        matches!(self, ColorBucket::StrongCold | ColorBucket::StrongHot)
    }
}

/// Classify `iv` against `baseline_iv` by signed difference.
pub fn color_for(iv: f64, baseline_iv: f64) -> ColorBucket {
    let diff = iv - baseline_iv;
    if diff <= -STRONG_THRESHOLD + DIFF_EPSILON {
        ColorBucket::StrongCold
    } else if diff <= -DIFF_EPSILON {
        ColorBucket::MildCold
    } else if diff < DIFF_EPSILON {
        ColorBucket::Neutral
    } else if diff < STRONG_THRESHOLD - DIFF_EPSILON {
        ColorBucket::MildHot
    } else {
        ColorBucket::StrongHot
    }
}

/// Middle-row IV of a column
pub fn baseline_iv(matrix: &SurfaceMatrix, column: usize) -> Option<f64> {
    let (rows, _) = matrix.dims();
    matrix.iv(rows / 2, column)
}

impl SurfaceMatrix {
    /// Bucket for every cell, same shape as [`SurfaceMatrix::ivs`]
    pub fn color_grid(&self) -> Array2<ColorBucket> {
        let (rows, _) = self.dims();
        let ivs = self.ivs();
        Array2::from_shape_fn(self.dims(), |(i, j)| color_for(ivs[[i, j]], ivs[[rows / 2, j]]))
    }
}

/// Where a strike sits relative to the underlying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoneynessFlag {
    Atm,
    NearAtm,
    Away,
}

/// Absolute-dollar moneyness flag
pub fn moneyness_flag(strike: f64, underlying_price: f64) -> MoneynessFlag {
    let distance = (strike - underlying_price).abs();
    if distance < ATM_TOLERANCE {
        MoneynessFlag::Atm
    } else if distance <= NEAR_ATM_BAND {
        MoneynessFlag::NearAtm
    } else {
        MoneynessFlag::Away
    }
}

impl SurfaceMatrix {
    /// Flag per row, in current row order
    pub fn moneyness_flags(&self) -> Vec<MoneynessFlag> {
        self.strikes()
            .iter()
            .map(|&k| moneyness_flag(k, self.underlying_price()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContractType, OptionContract};

    #[test]
    fn test_buckets() {
        assert_eq!(color_for(0.20, 0.30), ColorBucket::StrongCold);
        assert_eq!(color_for(0.28, 0.30), ColorBucket::MildCold);
        assert_eq!(color_for(0.30, 0.30), ColorBucket::Neutral);
        assert_eq!(color_for(0.32, 0.30), ColorBucket::MildHot);
        assert_eq!(color_for(0.34, 0.30), ColorBucket::MildHot);
        assert_eq!(color_for(0.36, 0.30), ColorBucket::StrongHot);
        assert_eq!(color_for(0.45, 0.30), ColorBucket::StrongHot);
    }

    #[test]
    fn test_bucket_edges() {
        assert_eq!(color_for(-0.05, 0.0), ColorBucket::StrongCold);
        assert_eq!(color_for(-0.0499, 0.0), ColorBucket::MildCold);
        assert_eq!(color_for(0.05, 0.0), ColorBucket::StrongHot);
        assert_eq!(color_for(0.0499, 0.0), ColorBucket::MildHot);
        assert_eq!(color_for(0.25, 0.3125), ColorBucket::StrongCold);
        assert_eq!(color_for(0.25, 0.25 + 0.03125), ColorBucket::MildCold);
    }

    #[test]
    fn test_decimal_quotes_on_threshold() {
        // 0.35 - 0.30 is 0.04999999999999999 in binary
        assert_eq!(color_for(0.35, 0.30), ColorBucket::StrongHot);
        assert_eq!(color_for(0.25, 0.30), ColorBucket::StrongCold);
        assert_eq!(color_for(0.15, 0.10), ColorBucket::StrongHot);
        assert_eq!(color_for(0.349, 0.30), ColorBucket::MildHot);
        assert_eq!(color_for(0.1 + 0.2, 0.3), ColorBucket::Neutral);
    }

    #[test]
    fn test_baseline_is_middle_row() {
        let records: Vec<OptionContract> = [(90.0, 0.20), (100.0, 0.30), (110.0, 0.40)]
            .iter()
            .map(|&(k, iv)| OptionContract::new(ContractType::Call, k, "2024-06-21", iv, 100.0))
            .collect();
        let m = SurfaceMatrix::build(ContractType::Call, &records).unwrap();

        assert_eq!(baseline_iv(&m, 0), Some(0.30));
        assert_eq!(baseline_iv(&m, 1), None);

        let grid = m.color_grid();
        assert_eq!(grid[[0, 0]], ColorBucket::StrongCold);
        assert_eq!(grid[[1, 0]], ColorBucket::Neutral);
        assert_eq!(grid[[2, 0]], ColorBucket::StrongHot);
    }

    #[test]
    fn test_moneyness_flags() {
        assert_eq!(moneyness_flag(100.0, 100.005), MoneynessFlag::Atm);
        assert_eq!(moneyness_flag(105.0, 100.0), MoneynessFlag::NearAtm);
        assert_eq!(moneyness_flag(95.5, 100.0), MoneynessFlag::NearAtm);
        assert_eq!(moneyness_flag(105.5, 100.0), MoneynessFlag::Away);

        let records: Vec<OptionContract> = [90.0, 100.0, 103.0]
            .iter()
            .map(|&k| OptionContract::new(ContractType::Put, k, "2024-06-21", 0.3, 100.0))
            .collect();
        let m = SurfaceMatrix::build(ContractType::Put, &records).unwrap();
        assert_eq!(
            m.moneyness_flags(),
            vec![MoneynessFlag::Away, MoneynessFlag::Atm, MoneynessFlag::NearAtm]
        );
    }
}
