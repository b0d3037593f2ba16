//! whisk-wrap library interface
//!
//! Orchestrates whisker tracing for one recording session: locate the
//! video, normalize the tracing parameters, allocate a fresh output slot,
//! optionally preprocess the raw capture, run the tracing engine and record
//! provenance metadata. Exposed as a library for the binaries and for
//! integration testing.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod services;
pub mod session;

pub use crate::config::WrapConfig;
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::pipeline::{Pipeline, RunOptions, RunSummary};
pub use crate::process::{SystemRunner, ToolRunner};
pub use crate::session::SessionKey;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_level` (from `[logging] level`).
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Log build identification; call right after [`init_tracing`]
pub fn log_build_info(binary: &str) {
    tracing::info!(
        "Starting {} v{} [{}] built {} ({})",
        binary,
        env!("CARGO_PKG_VERSION"),
        env!("WHISK_COMMIT"),
        env!("WHISK_BUILT_AT"),
        env!("WHISK_PROFILE")
    );
}
