//! Sheet Packer
//!
//! Packs rectangular parts onto sheets, one material at a time. Within a
//! material group parts are sorted by area (largest first, stable) and
//! placed with the MaxRects heuristic using best-short-side-fit scoring.
//! Open sheets are tried in order before a new one is started, so the
//! result depends only on the input order.
//!
//! Spacing is handled by growing every part footprint and the usable sheet
//! area by the same amount: parts end up exactly `part_spacing` apart and
//! never closer than `sheet_margin` to the sheet edge. When the contour
//! cutter is known, its diameter is a floor for the spacing and its radius a
//! floor for the margin, so an outward contour stays clear of neighbours and
//! on the sheet.

use crate::error::NestError;
use nestkit_core::{Part, PlacedPart, SheetCatalog};
use nestkit_settings::PackingSettings;
use serde::Serialize;
use tracing::{debug, info, warn};

const EPSILON: f64 = 1e-6;

/// Sheet size and rotation policy for one packing run
#[derive(Debug, Clone, PartialEq)]
pub struct PackingOptions {
    /// Sheet size used for materials missing from the catalog
    pub sheet_width: f64,
    pub sheet_height: f64,
    /// Global rotation switch; grain can still forbid it per material
    pub allow_rotation: bool,
    pub part_spacing: f64,
    pub sheet_margin: f64,
    /// Diameter of the cutter that routes part contours
    pub tool_clearance: f64,
}

impl PackingOptions {
    pub fn new(sheet_width: f64, sheet_height: f64, allow_rotation: bool) -> Self {
        Self {
            sheet_width,
            sheet_height,
            allow_rotation,
            part_spacing: 0.0,
            sheet_margin: 0.0,
            tool_clearance: 0.0,
        }
    }

    /// Take spacing and margin from the catalog's packing settings
    pub fn with_settings(mut self, settings: &PackingSettings) -> Self {
        self.part_spacing = settings.part_spacing;
        self.sheet_margin = settings.sheet_margin;
        self
    }

    /// Keep parts apart by at least the contour cutter diameter
    pub fn with_tool_clearance(mut self, diameter: f64) -> Self {
        self.tool_clearance = diameter.max(0.0);
        self
    }

    /// Gap actually left between neighbouring parts
    pub fn effective_spacing(&self) -> f64 {
        self.part_spacing.max(self.tool_clearance)
    }

    /// Border actually left along the sheet edge
    pub fn effective_margin(&self) -> f64 {
        self.sheet_margin.max(self.tool_clearance / 2.0)
    }
}

/// One sheet and everything placed on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetLayout {
    /// Position in the job, counted across all materials
    pub index: usize,
    pub material: String,
    pub thickness: f64,
    pub width: f64,
    pub height: f64,
    pub placements: Vec<PlacedPart>,
}

impl SheetLayout {
    /// Fraction of the sheet covered by parts
    pub fn utilization(&self) -> f64 {
        let used: f64 = self.placements.iter().map(|p| p.length * p.width).sum();
        used / (self.width * self.height)
    }
}

/// Packing result for a whole job
#[derive(Debug, Default)]
pub struct PackingResult {
    pub sheets: Vec<SheetLayout>,
    /// One `PackingInfeasible` per material group that could not be packed
    pub failures: Vec<NestError>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FreeRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl FreeRect {
    fn right(&self) -> f64 {
        self.x + self.w
    }

    fn top(&self) -> f64 {
        self.y + self.h
    }

    fn intersects(&self, other: &FreeRect) -> bool {
        self.x < other.right() - EPSILON
            && other.x < self.right() - EPSILON
            && self.y < other.top() - EPSILON
            && other.y < self.top() - EPSILON
    }

    fn contains(&self, other: &FreeRect) -> bool {
        other.x >= self.x - EPSILON
            && other.y >= self.y - EPSILON
            && other.right() <= self.right() + EPSILON
            && other.top() <= self.top() + EPSILON
    }
}

/// Candidate position: origin, rotation and (short, long) leftover score
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x: f64,
    y: f64,
    rotated: bool,
    score: (f64, f64),
}

/// MaxRects free-space bookkeeping for one sheet
#[derive(Debug, Clone)]
struct MaxRectsBin {
    free: Vec<FreeRect>,
}

impl MaxRectsBin {
    fn new(origin: f64, width: f64, height: f64) -> Self {
        Self {
            free: vec![FreeRect {
                x: origin,
                y: origin,
                w: width,
                h: height,
            }],
        }
    }

    /// Best-short-side-fit position for a `w x h` footprint
    fn find_position(&self, w: f64, h: f64, allow_rotation: bool) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let orientations: &[bool] = if allow_rotation {
            &[false, true]
        } else {
            &[false]
        };

        for rect in &self.free {
            for &rotated in orientations {
                let (pw, ph) = if rotated { (h, w) } else { (w, h) };
                if pw > rect.w + EPSILON || ph > rect.h + EPSILON {
                    continue;
                }
                let leftover_w = rect.w - pw;
                let leftover_h = rect.h - ph;
                let score = (leftover_w.min(leftover_h), leftover_w.max(leftover_h));
                let better = match best {
                    None => true,
                    Some(b) => {
                        score.0 < b.score.0 - EPSILON
                            || ((score.0 - b.score.0).abs() <= EPSILON
                                && score.1 < b.score.1 - EPSILON)
                    }
                };
                if better {
                    best = Some(Candidate {
                        x: rect.x,
                        y: rect.y,
                        rotated,
                        score,
                    });
                }
            }
        }
        best
    }

    fn place(&mut self, used: FreeRect) {
        let mut next = Vec::with_capacity(self.free.len() + 4);
        for rect in &self.free {
            if !rect.intersects(&used) {
                next.push(*rect);
                continue;
            }
            if used.x > rect.x + EPSILON {
                next.push(FreeRect {
                    w: used.x - rect.x,
                    ..*rect
                });
            }
            if used.right() < rect.right() - EPSILON {
                next.push(FreeRect {
                    x: used.right(),
                    w: rect.right() - used.right(),
                    ..*rect
                });
            }
            if used.y > rect.y + EPSILON {
                next.push(FreeRect {
                    h: used.y - rect.y,
                    ..*rect
                });
            }
            if used.top() < rect.top() - EPSILON {
                next.push(FreeRect {
                    y: used.top(),
                    h: rect.top() - used.top(),
                    ..*rect
                });
            }
        }

        // Drop rectangles contained in another; keep the first of duplicates
        let mut pruned: Vec<FreeRect> = Vec::with_capacity(next.len());
        for (i, rect) in next.iter().enumerate() {
            let redundant = next.iter().enumerate().any(|(j, other)| {
                i != j && other.contains(rect) && (!rect.contains(other) || j < i)
            });
            if !redundant {
                pruned.push(*rect);
            }
        }
        self.free = pruned;
    }
}

/// Material groups in order of first appearance
pub(crate) fn group_by_material(parts: &[Part]) -> Vec<(String, Vec<&Part>)> {
    let mut groups: Vec<(String, Vec<&Part>)> = Vec::new();
    for part in parts {
        match groups.iter_mut().find(|(m, _)| *m == part.material) {
            Some((_, members)) => members.push(part),
            None => groups.push((part.material.clone(), vec![part])),
        }
    }
    groups
}

/// Pack every part onto sheets.
///
/// Material groups never share a sheet. A group containing a part that does
/// not fit an empty sheet is reported in `failures` and produces no sheets;
/// other groups are unaffected.
pub fn pack_parts(parts: &[Part], catalog: &SheetCatalog, options: &PackingOptions) -> PackingResult {
    let mut result = PackingResult::default();

    for (material, members) in group_by_material(parts) {
        let spec = catalog.get(&material);
        let (sheet_width, sheet_height) = spec
            .map(|s| (s.width, s.height))
            .unwrap_or((options.sheet_width, options.sheet_height));
        let thickness = spec
            .map(|s| s.thickness)
            .unwrap_or_else(|| members.first().map(|p| p.thickness).unwrap_or_default());
        let allow_rotation = options.allow_rotation && catalog.rotation_allowed(&material);

        let first_index = result.sheets.len();
        match pack_group(
            &members,
            sheet_width,
            sheet_height,
            allow_rotation,
            options,
            first_index,
        ) {
            Ok(groups) => {
                for (offset, placements) in groups.into_iter().enumerate() {
                    let layout = SheetLayout {
                        index: first_index + offset,
                        material: material.clone(),
                        thickness,
                        width: sheet_width,
                        height: sheet_height,
                        placements,
                    };
                    info!(
                        sheet = layout.index,
                        material = %material,
                        parts = layout.placements.len(),
                        utilization = %format!("{:.1}%", layout.utilization() * 100.0),
                        "Packed sheet"
                    );
                    result.sheets.push(layout);
                }
            }
            Err(err) => {
                warn!(material = %material, "{}", err);
                result.failures.push(err);
            }
        }
    }

    result
}

fn pack_group(
    members: &[&Part],
    sheet_width: f64,
    sheet_height: f64,
    allow_rotation: bool,
    options: &PackingOptions,
    first_index: usize,
) -> Result<Vec<Vec<PlacedPart>>, NestError> {
    let spacing = options.effective_spacing();
    let margin = options.effective_margin();
    let usable_w = sheet_width - 2.0 * margin + spacing;
    let usable_h = sheet_height - 2.0 * margin + spacing;

    let mut order: Vec<&Part> = members.to_vec();
    order.sort_by(|a, b| b.area().total_cmp(&a.area()));

    let mut bins: Vec<MaxRectsBin> = Vec::new();
    let mut sheets: Vec<Vec<PlacedPart>> = Vec::new();

    for part in order {
        let w = part.length + spacing;
        let h = part.width + spacing;

        let mut target = bins
            .iter()
            .enumerate()
            .find_map(|(i, bin)| bin.find_position(w, h, allow_rotation).map(|c| (i, c)));

        if target.is_none() {
            let bin = MaxRectsBin::new(margin, usable_w, usable_h);
            let Some(candidate) = bin.find_position(w, h, allow_rotation) else {
                return Err(NestError::PackingInfeasible {
                    part: part.name.clone(),
                    material: part.material.clone(),
                    length: part.length,
                    width: part.width,
                    sheet_width,
                    sheet_height,
                });
            };
            bins.push(bin);
            sheets.push(Vec::new());
            debug!(sheet = first_index + bins.len() - 1, "Opened new sheet");
            target = Some((bins.len() - 1, candidate));
        }

        if let Some((bin_index, candidate)) = target {
            let (fw, fh) = if candidate.rotated { (h, w) } else { (w, h) };
            bins[bin_index].place(FreeRect {
                x: candidate.x,
                y: candidate.y,
                w: fw,
                h: fh,
            });
            sheets[bin_index].push(PlacedPart::new(
                (*part).clone(),
                first_index + bin_index,
                candidate.x,
                candidate.y,
                candidate.rotated,
            ));
        }
    }

    Ok(sheets)
}
