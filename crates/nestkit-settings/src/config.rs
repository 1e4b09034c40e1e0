//! Configuration catalog for nesting jobs
//!
//! Provides catalog file handling, validation, and the built-in defaults used
//! when no catalog is configured. Supports JSON and TOML file formats.
//!
//! The catalog is organized into logical sections:
//! - Machine profile (templates, heights, precision, image and label settings)
//! - Tool catalog
//! - Layer rules
//! - Sheet stock per material
//! - Packing preferences

use crate::error::{SettingsError, SettingsResult};
use nestkit_core::{
    default_tools, LayerRule, LayerRuleSet, MachineProfile, SheetCatalog, SheetSpec, Tool,
    ToolCatalog,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How a sheet's leftover area is split into rectangular offcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OffcutDecomposition {
    /// One rectangle per connected leftover region (its bounding box)
    #[default]
    BoundingBox,
    /// Exact split of each region into non-overlapping rectangles
    Exact,
}

/// Packing preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackingSettings {
    /// Gap left between neighbouring parts (mm)
    pub part_spacing: f64,
    /// Border left unused around the sheet edge (mm)
    pub sheet_margin: f64,
    /// Offcuts narrower than this in either direction are discarded (mm)
    pub min_offcut_dimension: f64,
    pub offcut_decomposition: OffcutDecomposition,
}

impl Default for PackingSettings {
    fn default() -> Self {
        Self {
            part_spacing: 0.0,
            sheet_margin: 0.0,
            min_offcut_dimension: 0.0,
            offcut_decomposition: OffcutDecomposition::BoundingBox,
        }
    }
}

/// Complete job configuration
///
/// Aggregates all catalog sections and provides file I/O operations. The
/// pipeline receives it by reference and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Catalog {
    pub machine: MachineProfile,
    pub tools: Vec<Tool>,
    pub layer_rules: Vec<LayerRule>,
    pub sheets: Vec<SheetSpec>,
    pub packing: PackingSettings,
}

impl Catalog {
    /// Create new catalog with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load catalog from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let catalog: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)?
        } else {
            return Err(SettingsError::UnsupportedFormat(path.display().to_string()));
        };

        catalog.validate()?;
        debug!(
            path = %path.display(),
            tools = catalog.tools.len(),
            layer_rules = catalog.layer_rules.len(),
            sheets = catalog.sheets.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    /// Load the catalog, falling back to built-in defaults when no file is
    /// configured or the file does not exist.
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(p) if p.exists() => Self::load_from_file(p),
            Some(p) => {
                warn!(path = %p.display(), "Catalog not found, using built-in defaults");
                Ok(Self::default())
            }
            None => {
                warn!("No catalog configured, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Save catalog to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)?
        } else {
            return Err(SettingsError::UnsupportedFormat(path.display().to_string()));
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate catalog contents
    pub fn validate(&self) -> SettingsResult<()> {
        self.machine.validate()?;

        if self.packing.part_spacing < 0.0 {
            return Err(SettingsError::InvalidSetting {
                key: "packing.part_spacing".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        if self.packing.sheet_margin < 0.0 {
            return Err(SettingsError::InvalidSetting {
                key: "packing.sheet_margin".to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        for tool in &self.tools {
            if tool.diameter <= 0.0 {
                return Err(SettingsError::InvalidSetting {
                    key: format!("tools.{}", tool.code),
                    reason: "diameter must be > 0".to_string(),
                });
            }
        }

        for sheet in &self.sheets {
            if sheet.width <= 0.0 || sheet.height <= 0.0 {
                return Err(nestkit_core::Error::InvalidDimensions {
                    name: sheet.material.clone(),
                    length: sheet.width,
                    width: sheet.height,
                }
                .into());
            }
        }

        let tools = self.tool_catalog();
        for rule in &self.layer_rules {
            if let Some(code) = &rule.tool {
                if tools.find(code).is_none() {
                    return Err(nestkit_core::Error::UnknownTool(code.clone()).into());
                }
            }
        }
        if let Some(code) = &self.machine.contour_tool {
            if tools.find(code).is_none() {
                return Err(nestkit_core::Error::UnknownTool(code.clone()).into());
            }
        }

        LayerRuleSet::new(&self.layer_rules)?;
        Ok(())
    }

    /// Tool catalog, or the built-in tools when none are configured
    pub fn tool_catalog(&self) -> ToolCatalog {
        if self.tools.is_empty() {
            ToolCatalog::from_tools(default_tools())
        } else {
            ToolCatalog::from_tools(self.tools.clone())
        }
    }

    /// Sheet catalog keyed by material
    pub fn sheet_catalog(&self) -> SheetCatalog {
        SheetCatalog::from_sheets(self.sheets.clone())
    }

    /// Compiled layer rules
    pub fn layer_rule_set(&self) -> SettingsResult<LayerRuleSet> {
        Ok(LayerRuleSet::new(&self.layer_rules)?)
    }
}

/// Default catalog location: `<config dir>/nestkit/catalog.toml`
pub fn default_config_path() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("nestkit").join("catalog.toml"))
        .ok_or_else(|| {
            SettingsError::ConfigDirectory("platform has no configuration directory".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestkit_core::{OperationKind, ToolKind};

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = Catalog::new();
        assert!(catalog.validate().is_ok());
        assert!(!catalog.tool_catalog().is_empty());
    }

    #[test]
    fn test_rule_with_unknown_tool_is_rejected() {
        let mut catalog = Catalog::new();
        catalog.tools = vec![Tool::new("1", "Fresa 6mm", ToolKind::Mill, 6.0, 18000.0)];
        catalog.layer_rules.push(LayerRule {
            pattern: "HOLE_8_12".to_string(),
            kind: OperationKind::Hole {
                diameter: 8.0,
                depth: 12.0,
            },
            depth: None,
            tool: Some("99".to_string()),
        });
        assert!(matches!(
            catalog.validate(),
            Err(SettingsError::Model(nestkit_core::Error::UnknownTool(code))) if code == "99"
        ));
    }

    #[test]
    fn test_negative_spacing_is_rejected() {
        let mut catalog = Catalog::new();
        catalog.packing.part_spacing = -1.0;
        assert!(matches!(
            catalog.validate(),
            Err(SettingsError::InvalidSetting { .. })
        ));
    }
}
