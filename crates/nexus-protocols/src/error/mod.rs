//! Error types for the Nexus protocol layer.

mod executor;
mod loader;

pub use executor::*;
pub use loader::*;
