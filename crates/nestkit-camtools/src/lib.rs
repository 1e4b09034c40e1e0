//! # nestkit CAM Tools
//!
//! The nesting engine: from a job folder of cabinetry parts to ready-to-run
//! machine programs.
//!
//! ## Pipeline
//!
//! - **Manifest Reader** ([`dxt`]): the `.dxt` part list of a job
//! - **Geometry Reader** ([`geometry_reader`]): DXF entities and part outlines
//! - **Operation Extractor** ([`operation_extractor`], [`bpp`]): holes and
//!   slots from CAD layers and machine listings
//! - **Sheet Packer** ([`sheet_packer`]): MaxRects placement per material
//! - **Offcut Calculator** ([`offcut`]): reusable sheet remainders
//! - **Toolpath Synthesizer** ([`toolpath`]): per-sheet G-code programs
//! - **Artifact Generator** ([`artifacts`]): previews, labels and manifests
//! - **Guillotine Fallback** ([`guillotine`]): straight-cut plans
//!
//! [`pipeline`] ties the stages together.

pub mod artifacts;
pub mod bpp;
pub mod dxt;
pub mod error;
pub mod geometry_reader;
pub mod guillotine;
pub mod offcut;
pub mod operation_extractor;
pub mod pipeline;
pub mod sheet_packer;
pub mod toolpath;

// Re-export commonly used items
pub use dxt::{find_manifest, parse_manifest, read_manifest, ManifestEntry};
pub use error::{NestError, NestResult};
pub use geometry_reader::{
    contour_bounds, read_cad_file, resolve_geometry, Bounds, CadEntity, PartGeometry, Primitive,
};
pub use guillotine::{plan_guillotine, CutRecord, GuillotinePlan, GuillotineSheet};
pub use offcut::{compute_offcuts, remainder};
pub use operation_extractor::extract_operations;
pub use pipeline::{
    load_parts, pack_and_generate, preview_layout, JobOutcome, LayoutPreview, NestingRequest,
    SheetOutcome, SheetPreview,
};
pub use sheet_packer::{pack_parts, PackingOptions, PackingResult, SheetLayout};
pub use toolpath::{
    render_program, synthesize_offcut_contour, synthesize_part, synthesize_sheet, ProgramChunk,
    ProgramHeader, Stage, SynthContext, ToolState,
};
