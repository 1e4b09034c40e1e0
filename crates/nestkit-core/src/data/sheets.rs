//! Sheet stock and offcuts

use serde::{Deserialize, Serialize};

/// Raw sheet stock for one material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSpec {
    /// Material identifier as written in part manifests
    pub material: String,
    /// X extent in mm
    pub width: f64,
    /// Y extent in mm
    pub height: f64,
    pub thickness: f64,
    /// Directional grain ("possui veio"); parts may not be rotated
    #[serde(default, alias = "possui_veio")]
    pub has_grain: bool,
}

impl SheetSpec {
    pub fn new(material: impl Into<String>, width: f64, height: f64, thickness: f64) -> Self {
        Self {
            material: material.into(),
            width,
            height,
            thickness,
            has_grain: false,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Sheet catalog keyed by material (case-insensitive)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetCatalog {
    sheets: Vec<SheetSpec>,
}

impl SheetCatalog {
    pub fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    pub fn from_sheets(sheets: Vec<SheetSpec>) -> Self {
        Self { sheets }
    }

    /// Add or replace the entry for a material
    pub fn add_sheet(&mut self, sheet: SheetSpec) {
        let key = sheet.material.to_lowercase();
        if let Some(existing) = self
            .sheets
            .iter_mut()
            .find(|s| s.material.to_lowercase() == key)
        {
            *existing = sheet;
        } else {
            self.sheets.push(sheet);
        }
    }

    /// Get the entry for a material
    pub fn get(&self, material: &str) -> Option<&SheetSpec> {
        let key = material.trim().to_lowercase();
        self.sheets.iter().find(|s| s.material.to_lowercase() == key)
    }

    /// Whether rotation is allowed for a material: forbidden with grain,
    /// allowed when the material has no catalog entry.
    pub fn rotation_allowed(&self, material: &str) -> bool {
        self.get(material).map_or(true, |s| !s.has_grain)
    }

    pub fn sheets(&self) -> &[SheetSpec] {
        &self.sheets
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

/// Leftover rectangle of a sheet, candidate remnant stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offcut {
    pub sheet_index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub material: String,
    pub thickness: f64,
}

impl Offcut {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}
