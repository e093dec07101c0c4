//! Dashboard state shared by the GUI and CLI

pub mod state;

pub use state::*;
