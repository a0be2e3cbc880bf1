//! Public API module

pub mod public;
