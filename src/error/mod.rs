//! Error module orchestrator.
//!
//! Callers import error types from here; the definitions live in the
//! private `types` module.

mod types;

pub use types::{GridError, Result};
