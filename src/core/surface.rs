//! Implied volatility matrix
//!
//! Dense strike x expiration grid built from a flat list of contract
//! snapshots. Rows are strikes (ascending), columns are expirations
//! (chronological). Cells without a quote hold `0.0`.

use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::{MatrixError, MatrixResult};
use super::option::{ContractType, OptionContract};

/// IV value stored in cells with no quote
pub const MISSING_IV: f64 = 0.0;

/// Implied volatility surface as a dense matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMatrix {
    contract_type: ContractType,
    strikes: Vec<f64>,
    expirations: Vec<NaiveDate>,
    /// Volatility grid [strike, expiration] -> iv
    ivs: Array2<f64>,
    underlying_price: f64,
}

/// Bookkeeping from a single build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Records of the requested side that made it into the grid
    pub records: usize,
    /// Records of the requested side dropped for a bad strike or expiration
    pub skipped: usize,
    /// Writes that replaced an earlier record at the same cell
    pub duplicates: usize,
}

impl SurfaceMatrix {
    /// Build the matrix for one side of the chain.
    ///
    /// Duplicate (strike, expiration) keys are resolved last-write-wins.
    pub fn build(contract_type: ContractType, records: &[OptionContract]) -> MatrixResult<Self> {
        Self::build_with_stats(contract_type, records).map(|(matrix, _)| matrix)
    }

    /// Same as [`SurfaceMatrix::build`], also returning what the build did
    /// with the input.
    pub fn build_with_stats(
        contract_type: ContractType,
        records: &[OptionContract],
    ) -> MatrixResult<(Self, BuildStats)> {
        let mut stats = BuildStats::default();

        let filtered: Vec<(f64, NaiveDate, &OptionContract)> = records
            .iter()
            .filter(|r| r.contract_type == contract_type)
            .filter_map(|r| match (r.valid_strike(), r.valid_expiration()) {
                (Some(strike), Some(expiry)) => Some((strike, expiry, r)),
                _ => {
                    stats.skipped += 1;
                    None
                }
            })
            .collect();

        if stats.skipped > 0 {
            tracing::warn!(
                "Skipped {} {} records with unusable strike or expiration",
                stats.skipped,
                contract_type
            );
        }

        if filtered.is_empty() {
            return Err(MatrixError::EmptyFilteredSet { contract_type });
        }
        stats.records = filtered.len();

        let underlying_price = filtered
            .iter()
            .find_map(|(_, _, r)| r.usable_underlying())
            .ok_or(MatrixError::MissingReferencePrice {
                contract_type,
                records: filtered.len(),
            })?;

        // Pass 1: axes and their position indices
        let mut strikes: Vec<f64> = filtered.iter().map(|(k, _, _)| *k).collect();
        strikes.sort_by(|a, b| a.total_cmp(b));
        strikes.dedup();

        let expiry_index: BTreeMap<NaiveDate, usize> = filtered
            .iter()
            .map(|(_, e, _)| (*e, 0))
            .collect::<BTreeMap<_, _>>()
            .into_keys()
            .enumerate()
            .map(|(j, e)| (e, j))
            .collect();
        let expirations: Vec<NaiveDate> = expiry_index.keys().copied().collect();

        // Pass 2: fill by position
        let shape = (strikes.len(), expirations.len());
        let mut ivs = Array2::from_elem(shape, MISSING_IV);
        let mut written = Array2::from_elem(shape, false);

        for (strike, expiry, record) in &filtered {
            let i = match strikes.binary_search_by(|k| k.total_cmp(strike)) {
                Ok(i) => i,
                Err(_) => continue,
            };
            let j = expiry_index[expiry];

            if written[[i, j]] {
                stats.duplicates += 1;
            }
            written[[i, j]] = true;
            ivs[[i, j]] = record.iv_or_missing();
        }

        if stats.duplicates > 0 {
            tracing::debug!(
                "{} duplicate {} contract keys overwritten (last record wins)",
                stats.duplicates,
                contract_type
            );
        }

        Ok((
            Self {
                contract_type,
                strikes,
                expirations,
                ivs,
                underlying_price,
            },
            stats,
        ))
    }

    /// Assemble from already-consistent parts
    pub(crate) fn from_parts(
        contract_type: ContractType,
        strikes: Vec<f64>,
        expirations: Vec<NaiveDate>,
        ivs: Array2<f64>,
        underlying_price: f64,
    ) -> Self {
        debug_assert_eq!(ivs.dim(), (strikes.len(), expirations.len()));
        Self {
            contract_type,
            strikes,
            expirations,
            ivs,
            underlying_price,
        }
    }

    pub fn contract_type(&self) -> ContractType {
        self.contract_type
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn expirations(&self) -> &[NaiveDate] {
        &self.expirations
    }

    pub fn ivs(&self) -> &Array2<f64> {
        &self.ivs
    }

    pub fn underlying_price(&self) -> f64 {
        self.underlying_price
    }

    /// (rows, columns)
    pub fn dims(&self) -> (usize, usize) {
        self.ivs.dim()
    }

    /// IV at (row, column), `None` outside the grid
    pub fn iv(&self, row: usize, column: usize) -> Option<f64> {
        self.ivs.get([row, column]).copied()
    }

    /// True when the cell holds the missing-quote sentinel
    pub fn is_empty_cell(&self, row: usize, column: usize) -> bool {
        self.iv(row, column).map_or(true, |iv| iv == MISSING_IV)
    }

    /// IVs of one expiration across all strikes
    pub fn column(&self, column: usize) -> Option<ArrayView1<'_, f64>> {
        (column < self.expirations.len()).then(|| self.ivs.column(column))
    }

    /// Header text for an expiration column, e.g. "Jun 21, 2024"
    pub fn expiration_label(&self, column: usize) -> Option<String> {
        self.expirations
            .get(column)
            .map(|d| d.format("%b %d, %Y").to_string())
    }

    /// Number of cells carrying a quote
    pub fn quoted_cells(&self) -> usize {
        self.ivs.iter().filter(|iv| **iv != MISSING_IV).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(strike: f64, exp: &str, iv: f64) -> OptionContract {
        OptionContract::new(ContractType::Call, strike, exp, iv, 100.0)
    }

    #[test]
    fn test_build_two_strikes() {
        let records = vec![call(100.0, "2024-06-21", 0.30), call(110.0, "2024-06-21", 0.25)];
        let m = SurfaceMatrix::build(ContractType::Call, &records).unwrap();

        assert_eq!(m.strikes(), &[100.0, 110.0]);
        assert_eq!(m.expirations(), &[NaiveDate::from_ymd_opt(2024, 6, 21).unwrap()]);
        assert_eq!(m.iv(0, 0), Some(0.30));
        assert_eq!(m.iv(1, 0), Some(0.25));
        assert_eq!(m.underlying_price(), 100.0);
        assert_eq!(m.dims(), (2, 1));
    }

    #[test]
    fn test_missing_cells_are_zero() {
        let records = vec![call(100.0, "2024-06-21", 0.30), call(110.0, "2024-07-19", 0.25)];
        let m = SurfaceMatrix::build(ContractType::Call, &records).unwrap();

        assert_eq!(m.dims(), (2, 2));
        assert!(m.is_empty_cell(0, 1));
        assert!(m.is_empty_cell(1, 0));
        assert!(!m.is_empty_cell(0, 0));
        assert_eq!(m.quoted_cells(), 2);
    }

    #[test]
    fn test_expirations_sort_by_date_not_text() {
        let records = vec![call(100.0, "2024-10-1", 0.30), call(100.0, "2024-2-1", 0.25)];
        let m = SurfaceMatrix::build(ContractType::Call, &records).unwrap();

        assert_eq!(
            m.expirations(),
            &[
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            ]
        );
        assert_eq!(m.iv(0, 0), Some(0.25));
        assert_eq!(m.expiration_label(1).as_deref(), Some("Oct 01, 2024"));
    }

    #[test]
    fn test_last_record_wins() {
        let records = vec![
            call(100.0, "2024-06-21", 0.30),
            call(100.0, "2024-06-21", 0.33),
            call(100.0, "2024-06-21", 0.35),
        ];
        let (m, stats) = SurfaceMatrix::build_with_stats(ContractType::Call, &records).unwrap();

        assert_eq!(m.dims(), (1, 1));
        assert_eq!(m.iv(0, 0), Some(0.35));
        assert_eq!(stats.duplicates, 2);
        assert_eq!(stats.records, 3);
    }

    #[test]
    fn test_filters_other_side_and_invalid_records() {
        let mut bad_strike = call(0.0, "2024-06-21", 0.5);
        bad_strike.strike_price = Some(0.0);
        let mut bad_date = call(120.0, "not-a-date", 0.5);
        bad_date.expiration_date = Some("not-a-date".into());
        let put = OptionContract::new(ContractType::Put, 90.0, "2024-06-21", 0.4, 100.0);

        let records = vec![bad_strike, bad_date, put, call(100.0, "2024-06-21", 0.3)];
        let (m, stats) = SurfaceMatrix::build_with_stats(ContractType::Call, &records).unwrap();

        assert_eq!(m.strikes(), &[100.0]);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.records, 1);
    }

    #[test]
    fn test_empty_filtered_set() {
        let records = vec![call(100.0, "2024-06-21", 0.30)];
        let err = SurfaceMatrix::build(ContractType::Put, &records).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::EmptyFilteredSet { contract_type: ContractType::Put }
        ));

        let err = SurfaceMatrix::build(ContractType::Call, &[]).unwrap_err();
        assert!(matches!(err, MatrixError::EmptyFilteredSet { .. }));
    }

    #[test]
    fn test_missing_reference_price() {
        let mut a = call(100.0, "2024-06-21", 0.30);
        a.underlying_price = None;
        let mut b = call(105.0, "2024-06-21", 0.30);
        b.underlying_price = Some(f64::NAN);

        let err = SurfaceMatrix::build(ContractType::Call, &[a, b]).unwrap_err();
        assert!(matches!(
            err,
            MatrixError::MissingReferencePrice { records: 2, .. }
        ));
    }

    #[test]
    fn test_reference_price_is_first_not_average() {
        let mut a = call(100.0, "2024-06-21", 0.30);
        a.underlying_price = None;
        let mut b = call(105.0, "2024-06-21", 0.30);
        b.underlying_price = Some(101.5);
        let mut c = call(110.0, "2024-06-21", 0.30);
        c.underlying_price = Some(140.0);

        let m = SurfaceMatrix::build(ContractType::Call, &[a, b, c]).unwrap();
        assert_eq!(m.underlying_price(), 101.5);
    }

    #[test]
    fn test_column_view() {
        let records = vec![call(90.0, "2024-06-21", 0.2), call(100.0, "2024-06-21", 0.3)];
        let m = SurfaceMatrix::build(ContractType::Call, &records).unwrap();

        let col = m.column(0).unwrap();
        assert_eq!(col.to_vec(), vec![0.2, 0.3]);
        assert!(m.column(1).is_none());
    }
}
