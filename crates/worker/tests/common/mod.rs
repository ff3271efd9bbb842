//! Common test utilities and fixtures.

pub mod fixtures;
pub mod worker;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use worker::*;
