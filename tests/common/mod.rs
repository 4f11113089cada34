//! Common test utilities for segment-dl integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod browser;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use browser::*;
