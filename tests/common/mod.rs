//! Common test utilities for media-dl end-to-end tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod config;

#[allow(unused_imports)]
pub use assertions::*;
pub use config::*;
