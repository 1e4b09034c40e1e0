//! # nestkit
//!
//! Sheet nesting and CNC program generation for cabinetry parts.
//!
//! A job folder holds a `.dxt` part manifest and one DXF per part. nestkit
//! packs the parts onto stock sheets, computes reusable offcuts and writes
//! one machine program per sheet, with preview images, part labels and
//! shop-floor manifests.
//!
//! ## Architecture
//!
//! 1. **nestkit-core** - Parts, operations, tools, sheets, machine profiles, layer rules
//! 2. **nestkit-settings** - TOML job catalogs and their defaults
//! 3. **nestkit-camtools** - Packing, offcuts, toolpaths and artifacts
//! 4. **nestkit** - Command-line front end

pub use nestkit_camtools as camtools;
pub use nestkit_core::data;
pub use nestkit_settings as settings;

pub use nestkit_camtools::{
    pack_and_generate, preview_layout, JobOutcome, LayoutPreview, NestError, NestResult,
    NestingRequest,
};
pub use nestkit_core::{MachineProfile, Offcut, Operation, Part, PlacedPart, Tool, ToolKind};
pub use nestkit_settings::Catalog;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Logs go to stderr so command output on stdout stays machine-readable.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
