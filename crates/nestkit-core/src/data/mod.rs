//! Data models for a nesting job
//!
//! This module provides:
//! - Parts, their machining operations and sheet placements
//! - The tool catalog
//! - Sheet stock, the per-material sheet catalog and offcuts
//! - Machine profiles (post-processor templates, image and label settings)
//! - Layer rules mapping CAD layer names to operations

pub mod layers;
pub mod machine;
pub mod part;
pub mod sheets;
pub mod tools;

pub use layers::{
    is_contour_layer, normalize_layer_name, LayerMatch, LayerResolver, LayerRule, LayerRuleSet,
    OperationKind,
};
pub use machine::{ImageSettings, LabelField, LabelFieldKind, LabelLayout, MachineProfile};
pub use part::{Face, Operation, Part, PlacedPart, SlotOrientation};
pub use sheets::{Offcut, SheetCatalog, SheetSpec};
pub use tools::{default_tools, Tool, ToolCatalog, ToolKind};
