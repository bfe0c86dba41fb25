//! Whitelabel validation engine.
//!
//! Scans a source tree (or a packaged archive) for brand identifying tokens
//! and copyright strings before redistribution:
//! - `builders::filter` decides which files enter the scan,
//! - `builders::patterns` and `builders::masking` expand the rename mappings
//!   and test tokens against them,
//! - `builders::copyright` checks lines against copyright patterns under a
//!   per-line timeout,
//! - `builders::names` validates archive entry names,
//! - `core::engine` ties everything together into one validation run.
pub mod builders;
pub mod core;
pub mod utils;

mod tests;
