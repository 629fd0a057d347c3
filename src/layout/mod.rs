//! Layout module orchestrator.
//!
//! Hosts import placement types from here while the solver implementation
//! lives in the private `core` module.

mod core;

pub use core::{OccupancyGrid, find_position};
