//! # volmatrix - Implied Volatility Matrix
//!
//! Turns an options-chain snapshot into a sortable, color-coded implied
//! volatility matrix: strikes down the side, expirations across the top.
//!
//! ## Key Components
//!
//! - **Matrix Builder**: flat contract records -> dense strike x expiration grid
//! - **Sort/Color Engine**: re-ordered views, color buckets, ATM flags, paging
//! - **Data Fetching**: paginated options snapshot API with local caching
//! - **Dashboard State**: loading phase, request tokens, sort toggling
//!
//! ## Usage
//!
//! ```rust
//! use volmatrix::prelude::*;
//!
//! let records = vec![
//!     OptionContract::new(ContractType::Call, 100.0, "2024-06-21", 0.30, 100.0),
//!     OptionContract::new(ContractType::Call, 110.0, "2024-06-21", 0.25, 100.0),
//! ];
//!
//! let matrix = SurfaceMatrix::build(ContractType::Call, &records).unwrap();
//! assert_eq!(matrix.strikes(), &[100.0, 110.0]);
//!
//! let by_iv = sort(&matrix, &SortConfig::ascending(SortKey::IvAtExpiration(0))).unwrap();
//! assert_eq!(by_iv.strikes(), &[110.0, 100.0]);
//! ```
//!
//! ## What This Crate Does NOT Do
//!
//! - Price options or compute Greeks
//! - Store history or time series
//! - Read credentials from the environment (callers pass an [`data::ApiKey`])

pub mod app;
pub mod core;
pub mod data;
pub mod view;

/// Prelude with commonly used types
pub mod prelude {
    // Core types
    pub use crate::core::{
        BuildStats, ContractType, MatrixError, MatrixResult, OptionContract, SurfaceMatrix,
        MISSING_IV,
    };

    // Views
    pub use crate::view::{
        baseline_iv, color_for, moneyness_flag, sort, ColorBucket, MoneynessFlag, RowPage,
        SortConfig, SortDirection, SortKey, NEAR_ATM_BAND,
    };

    // Data fetching
    pub use crate::data::{drain_pages, ApiKey, ChainSource, FetchConfig, SnapshotClient, SnapshotPage};

    // Dashboard
    pub use crate::app::{DashboardState, FetchOutcome, FetchPhase, RequestToken};
}

// Re-export main types at crate root
pub use crate::core::{MatrixError, MatrixResult, SurfaceMatrix};
