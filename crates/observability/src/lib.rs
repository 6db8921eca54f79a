//! Process-wide tracing setup shared by every studiodesk binary.

pub mod tracing;

pub use crate::tracing::{LogFormat, TracingOptions};

/// Install the default subscriber (JSON, `RUST_LOG` or `info`).
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(&TracingOptions::default());
}

pub fn init_with(options: &TracingOptions) {
    tracing::init(options);
}
