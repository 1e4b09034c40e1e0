//! Machine profile: post-processor templates and artifact settings
//!
//! A profile is an immutable bundle loaded once per job. Templates are plain
//! strings with positional tokens that the toolpath synthesizer substitutes:
//!
//! | Token | Meaning |
//! |---|---|
//! | `[X]` `[Y]` `[Z]` | target coordinates, formatted to `decimals` |
//! | `[F]` | feed rate |
//! | `[T]` `[TD]` | tool code / tool description |
//! | `[S]` | spindle speed |
//! | `[CMD]` | the tool's raw command fragment |
//! | `[HX]` `[HY]` `[HZ]` | homing coordinates |
//! | `[D]` `[FACE]` | hole diameter / face number (edge drilling only) |

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Highest decimal precision a profile may request
pub const MAX_DECIMALS: usize = 6;

/// Raster output settings for one artifact family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// File extension of the raster format (`png`, `bmp`, `jpg`...)
    pub format: String,
    /// Mirror horizontally after rendering
    pub mirror: bool,
    /// Rotate 90° clockwise after rendering
    pub rotate: bool,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            format: "png".to_string(),
            mirror: false,
            rotate: false,
        }
    }
}

/// Field printed on a part label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFieldKind {
    PartName,
    /// `length x width x thickness`
    Dimensions,
    Material,
    Thickness,
    Client,
    Project,
    Comment,
    /// Sheet number the part was nested on
    Sheet,
    ProgramCode,
}

/// Placement of one field on the label, in pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelField {
    pub kind: LabelFieldKind,
    pub x: i32,
    pub y: i32,
    /// Glyph height in pixels
    pub size: f32,
    /// Text printed before the value
    #[serde(default)]
    pub prefix: String,
}

/// Label ("etiqueta") layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelLayout {
    pub width_px: u32,
    pub height_px: u32,
    pub fields: Vec<LabelField>,
}

impl Default for LabelLayout {
    fn default() -> Self {
        let field = |kind, y, size: f32| LabelField {
            kind,
            x: 10,
            y,
            size,
            prefix: String::new(),
        };
        Self {
            width_px: 400,
            height_px: 200,
            fields: vec![
                field(LabelFieldKind::PartName, 10, 32.0),
                field(LabelFieldKind::Dimensions, 52, 24.0),
                field(LabelFieldKind::Material, 84, 24.0),
                field(LabelFieldKind::Client, 116, 20.0),
                field(LabelFieldKind::Sheet, 150, 20.0),
            ],
        }
    }
}

/// Post-processor and artifact configuration for one machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineProfile {
    /// Post-processor name written in program headers
    pub name: String,
    /// Clearance height for rapid travel (mm above the sheet)
    pub safety_z: f64,
    /// Height the tool rapids down to before cutting
    pub pre_work_z: f64,
    /// Decimal places for every coordinate ("casasDecimais")
    pub decimals: usize,
    /// Feed for slots and contours (mm/min)
    pub cut_feed: f64,
    /// Feed for vertical plunges of mill bits
    pub plunge_feed: f64,
    /// Feed for drilling
    pub drill_feed: f64,
    /// Maximum depth of a single contour pass
    pub contour_pass_depth: f64,
    /// How far the contour goes below the sheet thickness
    pub breakthrough: f64,
    pub rapid_template: String,
    pub cut_template: String,
    /// First tool load of a program
    pub header_template: String,
    /// Every later tool load
    pub tool_change_template: String,
    pub footer_template: String,
    /// Horizontal boring block; edge holes are skipped when absent
    pub edge_drill_template: Option<String>,
    pub home_x: f64,
    pub home_y: f64,
    pub home_z: f64,
    /// Tool code used for contours; the first mill in the catalog otherwise
    pub contour_tool: Option<String>,
    /// Width of sheet preview images in pixels
    pub preview_width_px: u32,
    pub sheet_image: ImageSettings,
    pub label_image: ImageSettings,
    pub label_layout: Option<LabelLayout>,
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self {
            name: "nestkit-generic".to_string(),
            safety_z: 20.0,
            pre_work_z: 5.0,
            decimals: 3,
            cut_feed: 6000.0,
            plunge_feed: 2000.0,
            drill_feed: 2000.0,
            contour_pass_depth: 10.0,
            breakthrough: 0.3,
            rapid_template: "G0 X[X] Y[Y] Z[Z]".to_string(),
            cut_template: "G1 X[X] Y[Y] Z[Z] F[F]".to_string(),
            header_template: "G90 G21 G17\nT[T] M6 ; [TD]\n[CMD]\nS[S] M3".to_string(),
            tool_change_template: "M5\nG0 Z[HZ]\nT[T] M6 ; [TD]\n[CMD]\nS[S] M3".to_string(),
            footer_template: "M5\nG0 Z[HZ]\nG0 X[HX] Y[HY]\nM30".to_string(),
            edge_drill_template: None,
            home_x: 0.0,
            home_y: 0.0,
            home_z: 50.0,
            contour_tool: None,
            preview_width_px: 1100,
            sheet_image: ImageSettings::default(),
            label_image: ImageSettings::default(),
            label_layout: None,
        }
    }
}

impl MachineProfile {
    /// Validate heights, precision and templates
    pub fn validate(&self) -> Result<()> {
        if self.decimals > MAX_DECIMALS {
            return Err(Error::InvalidTemplate {
                name: "decimals".to_string(),
                reason: format!("at most {} decimal places are supported", MAX_DECIMALS),
            });
        }
        if self.safety_z < self.pre_work_z {
            return Err(Error::InvalidTemplate {
                name: "safety_z".to_string(),
                reason: "safety height must not be below the pre-work height".to_string(),
            });
        }
        if !self.contour_pass_depth.is_finite() || self.contour_pass_depth <= 0.0 {
            return Err(Error::InvalidTemplate {
                name: "contour_pass_depth".to_string(),
                reason: "pass depth must be > 0".to_string(),
            });
        }
        for (name, template) in [
            ("rapid_template", &self.rapid_template),
            ("cut_template", &self.cut_template),
        ] {
            for token in ["[X]", "[Y]", "[Z]"] {
                if !template.contains(token) {
                    return Err(Error::InvalidTemplate {
                        name: name.to_string(),
                        reason: format!("missing {} token", token),
                    });
                }
            }
        }
        Ok(())
    }
}
