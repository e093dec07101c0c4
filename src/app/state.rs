//! Dashboard state
//!
//! Single owner of everything the dashboards show. Fetch results come back
//! tagged with the token issued when the fetch started; only the most
//! recent token is accepted, so a slow response can never overwrite a newer
//! one. Matrices are replaced wholesale, never edited.

use chrono::NaiveDate;

use crate::core::{BuildStats, ContractType, MatrixError, MatrixResult, OptionContract, SurfaceMatrix};
use crate::data::normalize_symbol;
use crate::view::{sort, RowPage, SortConfig, SortDirection, SortKey};

/// Tag identifying one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// Fetch lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Loading {
        token: RequestToken,
        symbol: String,
        contract_type: ContractType,
    },
}

/// What happened to a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New matrix installed
    Applied,
    /// Fetch or build failed; previous matrix kept
    Failed,
    /// Token superseded; result discarded
    Stale,
}

/// Row ordering, with the IV column named by its expiration date so it can
/// be found again after columns move or the matrix is refetched.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RowOrder {
    Strike(SortDirection),
    Iv(NaiveDate, SortDirection),
}

/// Orderings currently applied to the view. Row and column orderings are
/// independent: ranking rows keeps the column order and vice versa.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ViewOrder {
    columns: Option<SortDirection>,
    rows: Option<RowOrder>,
    /// Last request touched rows rather than columns
    rows_last: bool,
}

#[derive(Debug)]
pub struct DashboardState {
    symbol: String,
    contract_type: ContractType,
    phase: FetchPhase,
    next_token: u64,
    /// Matrix as built, the source of truth for every view
    source: Option<SurfaceMatrix>,
    /// Matrix as displayed (sorted)
    view: Option<SurfaceMatrix>,
    /// Last sort request, in view column coordinates
    sort: Option<SortConfig>,
    order: ViewOrder,
    stats: Option<BuildStats>,
    error: Option<String>,
    page: usize,
    page_size: usize,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(ContractType::Call, 25)
    }
}

impl DashboardState {
    pub fn new(contract_type: ContractType, page_size: usize) -> Self {
        Self {
            symbol: String::new(),
            contract_type,
            phase: FetchPhase::Idle,
            next_token: 0,
            source: None,
            view: None,
            sort: None,
            order: ViewOrder::default(),
            stats: None,
            error: None,
            page: 0,
            page_size,
        }
    }

    /// Start a fetch. Any fetch still in flight is superseded.
    pub fn begin_fetch(
        &mut self,
        symbol: &str,
        contract_type: ContractType,
    ) -> MatrixResult<RequestToken> {
        let symbol = match normalize_symbol(symbol) {
            Ok(s) => s,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };

        self.next_token += 1;
        let token = RequestToken(self.next_token);
        if let FetchPhase::Loading { token: old, .. } = &self.phase {
            tracing::debug!("Request {:?} superseded by {:?}", old, token);
        }

        self.phase = FetchPhase::Loading {
            token,
            symbol,
            contract_type,
        };
        self.error = None;
        Ok(token)
    }

    /// Deliver the result of the fetch tagged `token`
    pub fn complete_fetch(
        &mut self,
        token: RequestToken,
        result: MatrixResult<Vec<OptionContract>>,
    ) -> FetchOutcome {
        let (symbol, contract_type) = match &self.phase {
            FetchPhase::Loading {
                token: current,
                symbol,
                contract_type,
            } if *current == token => (symbol.clone(), *contract_type),
            _ => {
                tracing::debug!("Discarding stale result for {:?}", token);
                return FetchOutcome::Stale;
            }
        };
        self.phase = FetchPhase::Idle;

        let built = result.and_then(|records| SurfaceMatrix::build_with_stats(contract_type, &records));

        match built {
            Ok((matrix, stats)) => {
                tracing::info!(
                    "{} {}: {} strikes x {} expirations",
                    symbol,
                    contract_type,
                    matrix.strikes().len(),
                    matrix.expirations().len()
                );
                self.symbol = symbol;
                self.contract_type = contract_type;
                self.stats = Some(stats);
                self.error = None;
                self.page = 0;
                self.install(matrix);
                FetchOutcome::Applied
            }
            Err(e) => {
                tracing::warn!("{} {} fetch failed: {}", symbol, contract_type, e);
                self.error = Some(e.to_string());
                FetchOutcome::Failed
            }
        }
    }

    /// Replace the source matrix and replay the current orderings on it. A
    /// row ordering whose expiration is gone from the new matrix is dropped.
    fn install(&mut self, matrix: SurfaceMatrix) {
        let mut view = matrix.clone();
        let mut column_config = None;
        let mut row_config = None;

        if let Some(direction) = self.order.columns {
            let config = SortConfig::new(SortKey::Expiration, direction);
            if let Ok(sorted) = sort(&view, &config) {
                view = sorted;
                column_config = Some(config);
            }
        }

        let row_key = match self.order.rows {
            Some(RowOrder::Strike(direction)) => Some((SortKey::Strike, direction)),
            Some(RowOrder::Iv(date, direction)) => view
                .expirations()
                .iter()
                .position(|d| *d == date)
                .map(|j| (SortKey::IvAtExpiration(j), direction)),
            None => None,
        };
        match row_key {
            Some((key, direction)) => {
                let config = SortConfig::new(key, direction);
                if let Ok(sorted) = sort(&view, &config) {
                    view = sorted;
                    row_config = Some(config);
                }
            }
            None => {
                if self.order.rows.is_some() {
                    tracing::debug!("Row sort expiration missing from new matrix, clearing");
                }
            }
        }
        if row_config.is_none() {
            self.order.rows = None;
        }

        self.sort = if self.order.rows_last {
            row_config.or(column_config)
        } else {
            column_config.or(row_config)
        };
        self.view = Some(view);
        self.source = Some(matrix);
    }

    /// Header click: same key flips direction, a new key sorts ascending.
    ///
    /// Column indices refer to the matrix on screen. The displayed matrix is
    /// re-sorted, so ranking rows keeps the current column order.
    pub fn request_sort(&mut self, key: SortKey) -> MatrixResult<SortConfig> {
        let view = self
            .view
            .as_ref()
            .ok_or_else(|| MatrixError::invalid_input("No matrix loaded"))?;

        let config = SortConfig::toggled(self.sort.as_ref(), key);
        let sorted = sort(view, &config)?;

        match key {
            SortKey::Expiration => {
                self.order.columns = Some(config.direction);
                self.order.rows_last = false;
            }
            SortKey::Strike => {
                self.order.rows = Some(RowOrder::Strike(config.direction));
                self.order.rows_last = true;
            }
            SortKey::IvAtExpiration(j) => {
                // sort() already rejected out-of-range columns
                let date = view.expirations()[j];
                self.order.rows = Some(RowOrder::Iv(date, config.direction));
                self.order.rows_last = true;
            }
        }

        self.sort = Some(config);
        self.view = Some(sorted);
        Ok(config)
    }

    /// Back to builder order
    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.order = ViewOrder::default();
        self.view = self.source.clone();
    }

    pub fn can_submit(&self) -> bool {
        !self.is_loading()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, FetchPhase::Loading { .. })
    }

    pub fn phase(&self) -> &FetchPhase {
        &self.phase
    }

    /// Matrix to display
    pub fn matrix(&self) -> Option<&SurfaceMatrix> {
        self.view.as_ref()
    }

    /// Matrix as built
    pub fn source_matrix(&self) -> Option<&SurfaceMatrix> {
        self.source.as_ref()
    }

    pub fn sort_config(&self) -> Option<&SortConfig> {
        self.sort.as_ref()
    }

    pub fn stats(&self) -> Option<&BuildStats> {
        self.stats.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Symbol of the matrix on screen
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Side of the matrix on screen
    pub fn contract_type(&self) -> ContractType {
        self.contract_type
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
        self.page = 0;
    }

    /// Current page of the displayed matrix
    pub fn row_page(&self) -> Option<RowPage> {
        self.view
            .as_ref()
            .map(|m| RowPage::of(m, self.page, self.page_size))
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = match &self.view {
            Some(m) => RowPage::of(m, page, self.page_size).page,
            None => 0,
        };
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(side: ContractType) -> Vec<OptionContract> {
        vec![
            OptionContract::new(side, 90.0, "2024-06-21", 0.40, 100.0),
            OptionContract::new(side, 100.0, "2024-06-21", 0.20, 100.0),
            OptionContract::new(side, 110.0, "2024-06-21", 0.30, 100.0),
        ]
    }

    #[test]
    fn test_fetch_lifecycle() {
        let mut state = DashboardState::default();
        assert!(state.can_submit());

        let token = state.begin_fetch("spy", ContractType::Call).unwrap();
        assert!(state.is_loading());
        assert!(!state.can_submit());

        let outcome = state.complete_fetch(token, Ok(records(ContractType::Call)));
        assert_eq!(outcome, FetchOutcome::Applied);
        assert!(state.can_submit());
        assert_eq!(state.symbol(), "SPY");
        assert_eq!(state.matrix().unwrap().strikes(), &[90.0, 100.0, 110.0]);
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut state = DashboardState::default();
        let old = state.begin_fetch("SPY", ContractType::Call).unwrap();
        let new = state.begin_fetch("QQQ", ContractType::Put).unwrap();
        assert_ne!(old, new);

        assert_eq!(
            state.complete_fetch(old, Ok(records(ContractType::Call))),
            FetchOutcome::Stale
        );
        assert!(state.matrix().is_none());
        assert!(state.is_loading());

        assert_eq!(
            state.complete_fetch(new, Ok(records(ContractType::Put))),
            FetchOutcome::Applied
        );
        assert_eq!(state.symbol(), "QQQ");
        assert_eq!(state.contract_type(), ContractType::Put);

        // a late duplicate delivery is stale too
        assert_eq!(state.complete_fetch(new, Ok(vec![])), FetchOutcome::Stale);
    }

    #[test]
    fn test_failure_keeps_last_good_matrix() {
        let mut state = DashboardState::default();
        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(records(ContractType::Call)));

        let t = state.begin_fetch("SPY", ContractType::Put).unwrap();
        let outcome = state.complete_fetch(t, Ok(records(ContractType::Call)));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert!(state.error().unwrap().contains("No put contracts"));
        assert_eq!(state.contract_type(), ContractType::Call);
        assert!(state.matrix().is_some());

        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        assert!(state.error().is_none());
        let outcome = state.complete_fetch(t, Err(MatrixError::upstream("HTTP 503")));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert!(state.error().unwrap().contains("HTTP 503"));
        assert!(state.matrix().is_some());
    }

    #[test]
    fn test_blank_symbol_rejected() {
        let mut state = DashboardState::default();
        assert!(state.begin_fetch("  ", ContractType::Call).is_err());
        assert!(!state.is_loading());
        assert!(state.error().is_some());
    }

    #[test]
    fn test_sort_toggles_and_keeps_source() {
        let mut state = DashboardState::default();
        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(records(ContractType::Call)));

        let cfg = state.request_sort(SortKey::IvAtExpiration(0)).unwrap();
        assert_eq!(cfg.direction, SortDirection::Ascending);
        assert_eq!(state.matrix().unwrap().strikes(), &[100.0, 110.0, 90.0]);

        let cfg = state.request_sort(SortKey::IvAtExpiration(0)).unwrap();
        assert_eq!(cfg.direction, SortDirection::Descending);
        assert_eq!(state.matrix().unwrap().strikes(), &[90.0, 110.0, 100.0]);
        assert_eq!(state.source_matrix().unwrap().strikes(), &[90.0, 100.0, 110.0]);

        let err = state.request_sort(SortKey::IvAtExpiration(3)).unwrap_err();
        assert!(matches!(err, MatrixError::InvalidSortTarget { .. }));
        assert_eq!(state.sort_config().unwrap().direction, SortDirection::Descending);

        state.clear_sort();
        assert!(state.sort_config().is_none());
        assert_eq!(state.matrix().unwrap().strikes(), &[90.0, 100.0, 110.0]);
    }

    #[test]
    fn test_sort_survives_refetch_when_applicable() {
        let mut state = DashboardState::default();
        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(records(ContractType::Call)));
        state.request_sort(SortKey::Strike).unwrap();
        state.request_sort(SortKey::Strike).unwrap();

        let t = state.begin_fetch("SPY", ContractType::Put).unwrap();
        state.complete_fetch(t, Ok(records(ContractType::Put)));
        assert_eq!(state.matrix().unwrap().strikes(), &[110.0, 100.0, 90.0]);
    }

    fn two_expiries() -> Vec<OptionContract> {
        vec![
            OptionContract::new(ContractType::Call, 90.0, "2024-06-21", 0.30, 100.0),
            OptionContract::new(ContractType::Call, 100.0, "2024-06-21", 0.20, 100.0),
            OptionContract::new(ContractType::Call, 90.0, "2024-12-20", 0.50, 100.0),
            OptionContract::new(ContractType::Call, 100.0, "2024-12-20", 0.40, 100.0),
        ]
    }

    fn dec_20() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 20).unwrap()
    }

    #[test]
    fn test_iv_sort_uses_displayed_column() {
        let mut state = DashboardState::default();
        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(two_expiries()));

        state.request_sort(SortKey::Expiration).unwrap();
        let cfg = state.request_sort(SortKey::Expiration).unwrap();
        assert_eq!(cfg.direction, SortDirection::Descending);
        assert_eq!(state.matrix().unwrap().expirations()[0], dec_20());

        // column 0 on screen is Dec 20: 100 (0.40) ranks below 90 (0.50)
        state.request_sort(SortKey::IvAtExpiration(0)).unwrap();
        let m = state.matrix().unwrap();
        assert_eq!(m.strikes(), &[100.0, 90.0]);
        assert_eq!(m.expirations()[0], dec_20());
        assert_eq!(m.iv(0, 0), Some(0.40));
        assert_eq!(m.iv(0, 1), Some(0.20));

        let cfg = state.request_sort(SortKey::IvAtExpiration(0)).unwrap();
        assert_eq!(cfg.direction, SortDirection::Descending);
        assert_eq!(state.matrix().unwrap().strikes(), &[90.0, 100.0]);
        assert_eq!(state.matrix().unwrap().expirations()[0], dec_20());
    }

    #[test]
    fn test_refetch_replays_iv_sort_by_date() {
        let mut state = DashboardState::default();
        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(two_expiries()));
        state.request_sort(SortKey::IvAtExpiration(1)).unwrap();
        assert_eq!(state.matrix().unwrap().strikes(), &[100.0, 90.0]);

        // a new front expiry shifts Dec 20 to column 2
        let mut with_front = two_expiries();
        with_front.push(OptionContract::new(ContractType::Call, 90.0, "2024-03-15", 0.10, 100.0));
        with_front.push(OptionContract::new(ContractType::Call, 100.0, "2024-03-15", 0.90, 100.0));
        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(with_front));

        assert_eq!(state.matrix().unwrap().strikes(), &[100.0, 90.0]);
        assert_eq!(state.sort_config().unwrap().key, SortKey::IvAtExpiration(2));

        // Dec 20 gone: the row ordering is dropped
        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(records(ContractType::Call)));
        assert!(state.sort_config().is_none());
        assert_eq!(state.matrix().unwrap().strikes(), &[90.0, 100.0, 110.0]);
    }

    #[test]
    fn test_paging() {
        let mut state = DashboardState::new(ContractType::Call, 2);
        assert!(state.row_page().is_none());

        let t = state.begin_fetch("SPY", ContractType::Call).unwrap();
        state.complete_fetch(t, Ok(records(ContractType::Call)));

        assert_eq!(state.row_page().unwrap().rows, 0..2);
        state.next_page();
        assert_eq!(state.row_page().unwrap().rows, 2..3);
        state.next_page();
        assert_eq!(state.row_page().unwrap().page, 1);
        state.prev_page();
        assert_eq!(state.row_page().unwrap().page, 0);
    }

    #[test]
    fn test_sort_without_matrix() {
        let mut state = DashboardState::default();
        assert!(state.request_sort(SortKey::Strike).is_err());
    }
}
