//! # Gateway Testing Utils
//!
//! Shared testing utilities for the gateway workspace: mock transports,
//! a scriptable mock broker and configuration builders.
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! gateway-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
