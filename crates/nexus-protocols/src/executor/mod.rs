//! Executor protocol definitions.
//!
//! Executors are the pluggable units of work handling in Nexus.

mod context;
mod manifest;
mod output;
mod snapshot;
mod traits;

pub use context::*;
pub use manifest::*;
pub use output::*;
pub use snapshot::*;
pub use traits::*;
