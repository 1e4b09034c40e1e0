//! Tool catalog
//!
//! This module provides:
//! - Tool kinds (drill vs. mill bits)
//! - Tool definitions as stored in the job configuration
//! - Catalog lookups by code, description, kind and diameter
//! - The built-in fallback tools used when no catalog is configured

use serde::{Deserialize, Serialize};

const DIAMETER_TOLERANCE: f64 = 0.01;

/// Tool kinds for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Boring bit for holes
    Drill,
    /// Router bit for slots and contours
    Mill,
    /// Saw blade for straight grooves
    Saw,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Drill => write!(f, "Drill"),
            Self::Mill => write!(f, "Mill"),
            Self::Saw => write!(f, "Saw"),
        }
    }
}

/// Catalog entry for a physical tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Machine tool code (e.g. `T1`, `101`)
    pub code: String,
    /// Human readable description, listed in program headers
    pub description: String,
    pub kind: ToolKind,
    /// Cutting diameter in mm
    pub diameter: f64,
    /// Spindle speed in RPM
    pub spindle_speed: f64,
    /// Raw command fragment substituted for `[CMD]` in tool-change blocks
    #[serde(default)]
    pub command: Option<String>,
}

impl Tool {
    /// Create a new tool with no raw command
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        kind: ToolKind,
        diameter: f64,
        spindle_speed: f64,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            kind,
            diameter,
            spindle_speed,
            command: None,
        }
    }

    /// Tool radius in mm
    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// Tool catalog - ordered collection of tools
///
/// Order matters: when several tools could serve an operation the first one
/// listed wins, which keeps program generation deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
}

impl ToolCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Build a catalog from a tool list
    pub fn from_tools(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    /// Add a tool, replacing any tool with the same code
    pub fn add_tool(&mut self, tool: Tool) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.code == tool.code) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Get a tool by code
    pub fn get(&self, code: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.code == code)
    }

    /// Get a tool by code or, failing that, by description (case-insensitive)
    pub fn find(&self, reference: &str) -> Option<&Tool> {
        self.get(reference).or_else(|| {
            let wanted = reference.to_lowercase();
            self.tools
                .iter()
                .find(|t| t.description.to_lowercase() == wanted)
        })
    }

    /// First tool of the given kind
    pub fn first_of_kind(&self, kind: ToolKind) -> Option<&Tool> {
        self.tools.iter().find(|t| t.kind == kind)
    }

    /// Drill whose diameter matches the hole diameter
    pub fn drill_for_diameter(&self, diameter: f64) -> Option<&Tool> {
        self.tools
            .iter()
            .filter(|t| t.kind == ToolKind::Drill)
            .find(|t| (t.diameter - diameter).abs() < DIAMETER_TOLERANCE)
    }

    /// Widest mill that still fits inside a slot of the given width
    pub fn mill_for_width(&self, width: f64) -> Option<&Tool> {
        self.tools
            .iter()
            .filter(|t| t.kind == ToolKind::Mill && t.diameter <= width + DIAMETER_TOLERANCE)
            .fold(None, |best: Option<&Tool>, t| match best {
                Some(b) if b.diameter >= t.diameter => Some(b),
                _ => Some(t),
            })
    }

    /// All tools in catalog order
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Get the number of tools in the catalog
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Built-in tools used when the job configuration has no tool catalog
pub fn default_tools() -> Vec<Tool> {
    vec![
        Tool::new("1", "Fresa 6mm", ToolKind::Mill, 6.0, 18000.0),
        Tool::new("2", "Broca 8mm", ToolKind::Drill, 8.0, 4000.0),
        Tool::new("3", "Broca 5mm", ToolKind::Drill, 5.0, 4000.0),
        Tool::new("4", "Broca 35mm", ToolKind::Drill, 35.0, 3000.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ToolCatalog {
        ToolCatalog::from_tools(default_tools())
    }

    #[test]
    fn test_find_by_code_or_description() {
        let catalog = catalog();
        assert_eq!(catalog.find("2").map(|t| t.diameter), Some(8.0));
        assert_eq!(catalog.find("broca 5mm").map(|t| t.code.as_str()), Some("3"));
        assert!(catalog.find("T99").is_none());
    }

    #[test]
    fn test_drill_for_diameter() {
        let catalog = catalog();
        assert_eq!(catalog.drill_for_diameter(35.0).map(|t| t.code.as_str()), Some("4"));
        assert!(catalog.drill_for_diameter(10.0).is_none());
    }

    #[test]
    fn test_mill_for_width_picks_widest_fitting() {
        let mut catalog = catalog();
        catalog.add_tool(Tool::new("5", "Fresa 3mm", ToolKind::Mill, 3.0, 20000.0));
        assert_eq!(catalog.mill_for_width(4.0).map(|t| t.code.as_str()), Some("5"));
        assert_eq!(catalog.mill_for_width(10.0).map(|t| t.code.as_str()), Some("1"));
        assert!(catalog.mill_for_width(2.0).is_none());
    }

    #[test]
    fn test_add_tool_replaces_same_code() {
        let mut catalog = catalog();
        let len = catalog.len();
        catalog.add_tool(Tool::new("1", "Fresa 8mm", ToolKind::Mill, 8.0, 16000.0));
        assert_eq!(catalog.len(), len);
        assert_eq!(catalog.get("1").map(|t| t.diameter), Some(8.0));
    }
}
