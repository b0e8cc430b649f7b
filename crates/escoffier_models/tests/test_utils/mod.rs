//! Test utilities for escoffier_models tests.

pub mod mock_driver;

#[allow(unused_imports)]
pub use mock_driver::{MockDriver, MockResponse};
