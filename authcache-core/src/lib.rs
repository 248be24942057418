//! authcache core - shared error taxonomy, logging and configuration
//!
//! Everything the cache engine and its binaries agree on lives here so the
//! engine crate stays focused on snapshots, freshness and verification.

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
