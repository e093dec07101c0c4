//! Presentation views over a built matrix
//!
//! Handles:
//! - Sorting by strike, expiration, or IV at one expiration
//! - Color buckets relative to a middle-row baseline
//! - ATM / near-ATM row flags
//! - Row paging

pub mod color;
pub mod page;
pub mod sort;

pub use color::*;
pub use page::*;
pub use sort::*;
