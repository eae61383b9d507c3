//! Process-wide logging setup shared by the API server and tools.

pub mod tracing;

pub use crate::tracing::LogFormat;

/// Install the global subscriber using `RUST_LOG` and `OFICINA_LOG_FORMAT`.
///
/// Calling it again is a no-op.
pub fn init() {
    let format = std::env::var("OFICINA_LOG_FORMAT")
        .ok()
        .and_then(|raw| LogFormat::parse(&raw))
        .unwrap_or_default();
    crate::tracing::init(format, "info");
}
