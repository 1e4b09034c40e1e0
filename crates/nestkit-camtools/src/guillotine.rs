//! Guillotine Fallback
//!
//! Straight-cut layouts for panel saws. Parts are stacked bottom to top in
//! columns, a new column starts to the right of the widest part of the
//! previous one, and a new sheet starts once nothing left fits. Parts are
//! never rotated and no toolpath is generated: the result is a list of
//! position/size records.

use crate::sheet_packer::{group_by_material, PackingOptions};
use nestkit_core::{Part, SheetCatalog};
use serde::Serialize;
use tracing::{info, warn};

const EPSILON: f64 = 1e-6;

/// Where one part is cut from its sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutRecord {
    pub part: String,
    pub x: f64,
    pub y: f64,
    pub length: f64,
    pub width: f64,
}

/// One sheet of a straight-cut plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuillotineSheet {
    pub index: usize,
    pub material: String,
    pub thickness: f64,
    pub width: f64,
    pub height: f64,
    pub cuts: Vec<CutRecord>,
}

/// Straight-cut plan for a whole job
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GuillotinePlan {
    pub sheets: Vec<GuillotineSheet>,
    /// Parts larger than an empty sheet
    pub unplaced: Vec<String>,
}

struct Column {
    x: f64,
    y: f64,
    width: f64,
}

/// Stack parts into columns, material by material
pub fn plan_guillotine(parts: &[Part], catalog: &SheetCatalog, options: &PackingOptions) -> GuillotinePlan {
    let mut plan = GuillotinePlan::default();
    let spacing = options.part_spacing;
    let margin = options.sheet_margin;

    for (material, members) in group_by_material(parts) {
        let spec = catalog.get(&material);
        let (sheet_width, sheet_height) = spec
            .map(|s| (s.width, s.height))
            .unwrap_or((options.sheet_width, options.sheet_height));
        let thickness = spec
            .map(|s| s.thickness)
            .unwrap_or_else(|| members.first().map(|p| p.thickness).unwrap_or_default());
        let max_x = sheet_width - margin;
        let max_y = sheet_height - margin;

        let (mut remaining, too_big): (Vec<&Part>, Vec<&Part>) = members
            .into_iter()
            .partition(|p| margin + p.length <= max_x + EPSILON && margin + p.width <= max_y + EPSILON);
        for part in too_big {
            warn!(part = %part.name, material = %material, "Part exceeds the sheet; not cut");
            plan.unplaced.push(part.name.clone());
        }

        while !remaining.is_empty() {
            let index = plan.sheets.len();
            let mut cuts = Vec::new();
            let mut column = Column {
                x: margin,
                y: margin,
                width: 0.0,
            };
            let mut left_over = Vec::new();

            for part in remaining {
                let fits_column = column.x + part.length <= max_x + EPSILON
                    && column.y + part.width <= max_y + EPSILON;
                if !fits_column {
                    let next_x = column.x + column.width + spacing;
                    let opens_column = column.width > 0.0
                        && next_x + part.length <= max_x + EPSILON
                        && margin + part.width <= max_y + EPSILON;
                    if !opens_column {
                        left_over.push(part);
                        continue;
                    }
                    column = Column {
                        x: next_x,
                        y: margin,
                        width: 0.0,
                    };
                }

                cuts.push(CutRecord {
                    part: part.name.clone(),
                    x: column.x,
                    y: column.y,
                    length: part.length,
                    width: part.width,
                });
                column.y += part.width + spacing;
                column.width = column.width.max(part.length);
            }

            // Every remaining part fits an empty sheet, so each pass places one
            if cuts.is_empty() {
                break;
            }
            info!(sheet = index, material = %material, parts = cuts.len(), "Planned straight-cut sheet");
            plan.sheets.push(GuillotineSheet {
                index,
                material: material.clone(),
                thickness,
                width: sheet_width,
                height: sheet_height,
                cuts,
            });
            remaining = left_over;
        }
    }

    plan
}
