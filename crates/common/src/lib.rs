//! GridRunner Common Library
//!
//! Shared types, the error taxonomy, and configuration for the GridRunner
//! harness.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{BrowserConfig, BrowserKind, HarnessConfig};
pub use error::{Error, Result};
pub use types::*;

/// GridRunner version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default output directory for run artifacts
pub fn default_output_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("test-results")
}
