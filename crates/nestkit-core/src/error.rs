//! Error handling for nestkit core types
//!
//! Provides the error type raised when a part, tool catalog or machine
//! profile violates one of the model invariants:
//! - Part dimensions must be positive
//! - Operations must lie inside their part
//! - Templates must be usable by the synthesizer
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Core model error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A part or sheet has a zero or negative dimension
    #[error("Invalid dimensions for '{name}': {length} x {width}")]
    InvalidDimensions {
        /// Name of the part or sheet.
        name: String,
        /// Length (X extent) in mm.
        length: f64,
        /// Width (Y extent) in mm.
        width: f64,
    },

    /// An operation lies outside the part it belongs to
    #[error("Operation at ({x}, {y}) lies outside part '{part}' ({length} x {width})")]
    OperationOutOfBounds {
        /// Name of the part.
        part: String,
        /// Operation X in part-local coordinates.
        x: f64,
        /// Operation Y in part-local coordinates.
        y: f64,
        /// Part length.
        length: f64,
        /// Part width.
        width: f64,
    },

    /// A machine profile template is unusable
    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate {
        /// Template field name.
        name: String,
        /// Why the template was rejected.
        reason: String,
    },

    /// A configured layer rule cannot be compiled
    #[error("Invalid layer rule '{pattern}': {reason}")]
    InvalidLayerRule {
        /// The rule's layer pattern.
        pattern: String,
        /// Why the rule was rejected.
        reason: String,
    },

    /// A tool code was referenced that the catalog does not contain
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

/// Result type for core model operations
pub type Result<T> = std::result::Result<T, Error>;
