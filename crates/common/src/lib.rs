//! vidmix Common Utilities
//!
//! Shared infrastructure for all vidmix crates:
//! - Error types and result aliases
//! - Monotonic clock and frame deadline pacing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
