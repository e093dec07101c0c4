//! Data fetching
//!
//! Paginated options snapshot API. The credential is passed in, never read
//! here. Nothing is written to disk.

pub mod snapshot;

pub use snapshot::*;
