//! Mock backend module
//!
//! Provides a mock provider backend for testing collectors without a network.

pub mod service;

pub use service::{MockOperation, MockProviderBackend};
