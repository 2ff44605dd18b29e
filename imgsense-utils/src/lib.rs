//! Common helpers shared across imgsense crates.

/// Application configuration and settings management.
pub mod config;
/// Test fixture loading and path resolution.
pub mod fixtures;
/// Image loading, resizing, and tensor layout conversion.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use fixtures::{fixture_path, fixtures_dir, load_fixture_json, load_fixture_text};
pub use image_utils::{
    compute_resize_scales, decode_image_bytes, load_image, resize_image, rgb_to_chw,
    rgb_to_hwc,
};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    timing_guard, timing_guard_if,
};

/// Initialize logging once for the CLI.
///
/// `RUST_LOG` takes precedence when set; otherwise `default_filter` applies. Calling this more
/// than once is harmless.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TELEMETRY_TARGET, LevelFilter::Trace);

    // Already initialized by an earlier call or a test harness.
    let _ = builder.try_init();
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
