//! Core data types for the volatility matrix
//!
//! Defines fundamental types:
//! - OptionContract: one snapshot record (side, strike, expiry, IV, spot)
//! - SurfaceMatrix: dense strike x expiration IV grid
//! - MatrixError: error taxonomy shared by every layer

pub mod error;
pub mod option;
pub mod surface;

pub use error::*;
pub use option::*;
pub use surface::*;
