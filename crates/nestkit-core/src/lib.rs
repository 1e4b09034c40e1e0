//! # nestkit Core
//!
//! Core types for nestkit.
//! Provides the data model shared by the settings layer and the nesting
//! engine: parts and operations, tools, sheets, machine profiles and layer
//! rules, plus the number formatting used in machine programs.

pub mod data;
pub mod error;
pub mod units;

pub use data::{
    default_tools, is_contour_layer, normalize_layer_name, Face, ImageSettings, LabelField,
    LabelFieldKind, LabelLayout, LayerMatch, LayerResolver, LayerRule, LayerRuleSet,
    MachineProfile, Offcut, Operation, OperationKind, Part, PlacedPart, SheetCatalog, SheetSpec,
    SlotOrientation, Tool, ToolCatalog, ToolKind,
};

pub use error::{Error, Result};
