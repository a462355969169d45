//! Tracing initialisation for binaries built on top of this crate.
//!
//! Mirrors the level-selection rule the storage backend's own service uses
//! (`RUST_LOG` wins if set, otherwise `debug` in debug builds and `warn` in
//! release), but without the OpenTelemetry export pipeline: nothing in this
//! workspace ships traces anywhere, so a plain formatting subscriber is all
//! the ambient logging needs.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber that writes formatted events to
/// stderr. Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = std::env::var("RUST_LOG").map_or_else(
        |_| {
            if cfg!(debug_assertions) {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("warn")
            }
        },
        EnvFilter::new,
    );

    fmt().with_env_filter(filter).try_init()
}
