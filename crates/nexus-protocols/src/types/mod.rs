//! Common types used across the Nexus engine.

mod common;
mod task;

pub use common::*;
pub use task::*;
