//! hotpatch - live code patching for running processes
//!
//! hotpatch lets a running program receive small incremental code changes
//! and apply them in place, without restarting, while a developer edits
//! source files. The producer half computes a minimal binary delta against
//! the last-known state of a compiled module; the consumer half, embedded in
//! the target process, receives deltas over a persistent channel and
//! hot-swaps the affected code.
#![warn(missing_docs)]

// Core foundational modules
pub mod constants;
pub mod core;
pub mod types;

// Producer side
pub mod baseline;
pub mod differ;
pub mod project;
pub mod session;
pub mod transport;

// Consumer side
pub mod applier;

// Shared monitoring
pub mod system;

// Re-export commonly used items for convenience
pub use crate::core::{Config, Error, Result};
pub use crate::types::{ModuleDelta, PatchOutcome};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize tracing and the metrics registry for a standalone driver.
///
/// Embedding hosts that configure their own tracing subscriber should skip
/// this and call [`system::metrics::init_registry`] directly.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Initializing {} v{}", NAME, VERSION);

    system::metrics::init_registry();

    Ok(())
}
