//! Offcut Calculator
//!
//! The leftover of a sheet is `sheet - union(parts)`, computed with `geo`
//! boolean operations. The remainder is then split into rectangles:
//!
//! - [`OffcutDecomposition::BoundingBox`] keeps one rectangle per connected
//!   region (its bounding box). A region whose box would reach into a placed
//!   part is decomposed exactly instead, so an offcut never covers a part;
//! - [`OffcutDecomposition::Exact`] cuts each region along every vertex
//!   coordinate and merges the resulting grid cells back into maximal
//!   strips, so the rectangles cover the region exactly and never overlap.

use crate::sheet_packer::SheetLayout;
use geo::{coord, Area, BooleanOps, BoundingRect, Contains, MultiPolygon, Point, Polygon, Rect};
use nestkit_core::Offcut;
use nestkit_settings::{OffcutDecomposition, PackingSettings};
use tracing::debug;

const EPSILON: f64 = 1e-6;

fn rect_polygon(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
}

/// Area of the sheet not covered by any placed part
pub fn remainder(layout: &SheetLayout) -> MultiPolygon<f64> {
    let sheet = MultiPolygon::new(vec![rect_polygon(0.0, 0.0, layout.width, layout.height)]);
    let covered = layout
        .placements
        .iter()
        .fold(MultiPolygon::new(Vec::new()), |acc, placed| {
            let (x0, y0, x1, y1) = placed.bounds();
            acc.union(&MultiPolygon::new(vec![rect_polygon(x0, y0, x1, y1)]))
        });
    sheet.difference(&covered)
}

/// Rectangular offcuts of a sheet, smallest-coordinate first
pub fn compute_offcuts(layout: &SheetLayout, settings: &PackingSettings) -> Vec<Offcut> {
    let leftover = remainder(layout);
    let rects: Vec<(f64, f64, f64, f64)> = match settings.offcut_decomposition {
        OffcutDecomposition::BoundingBox => leftover
            .iter()
            .flat_map(|polygon| match polygon.bounding_rect() {
                Some(r) if !overlaps_placement(layout, r) => {
                    vec![(r.min().x, r.min().y, r.max().x, r.max().y)]
                }
                _ => decompose_exact(polygon),
            })
            .collect(),
        OffcutDecomposition::Exact => leftover.iter().flat_map(decompose_exact).collect(),
    };

    let min = settings.min_offcut_dimension.max(EPSILON);
    let mut offcuts: Vec<Offcut> = rects
        .into_iter()
        .filter(|(x0, y0, x1, y1)| x1 - x0 >= min && y1 - y0 >= min)
        .map(|(x0, y0, x1, y1)| Offcut {
            sheet_index: layout.index,
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            material: layout.material.clone(),
            thickness: layout.thickness,
        })
        .collect();
    offcuts.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    debug!(
        sheet = layout.index,
        count = offcuts.len(),
        area = leftover.unsigned_area(),
        "Computed offcuts"
    );
    offcuts
}

fn overlaps_placement(layout: &SheetLayout, rect: Rect<f64>) -> bool {
    layout.placements.iter().any(|placed| {
        let (x0, y0, x1, y1) = placed.bounds();
        rect.min().x < x1 - EPSILON
            && x0 < rect.max().x - EPSILON
            && rect.min().y < y1 - EPSILON
            && y0 < rect.max().y - EPSILON
    })
}

fn sorted_breakpoints(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(f64::total_cmp);
    values.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
    values
}

/// Split one polygon into non-overlapping rectangles
fn decompose_exact(polygon: &Polygon<f64>) -> Vec<(f64, f64, f64, f64)> {
    let coords = || {
        polygon
            .exterior()
            .coords()
            .chain(polygon.interiors().iter().flat_map(|ring| ring.coords()))
    };
    let xs = sorted_breakpoints(coords().map(|c| c.x));
    let ys = sorted_breakpoints(coords().map(|c| c.y));

    // Horizontal strips per grid row
    let mut rows: Vec<Vec<(f64, f64)>> = Vec::with_capacity(ys.len().saturating_sub(1));
    for row in ys.windows(2) {
        let cy = (row[0] + row[1]) / 2.0;
        let mut strips: Vec<(f64, f64)> = Vec::new();
        for col in xs.windows(2) {
            let cx = (col[0] + col[1]) / 2.0;
            if !polygon.contains(&Point::new(cx, cy)) {
                continue;
            }
            match strips.last_mut() {
                Some(last) if (last.1 - col[0]).abs() < EPSILON => last.1 = col[1],
                _ => strips.push((col[0], col[1])),
            }
        }
        rows.push(strips);
    }

    // Stack identical strips of consecutive rows
    let mut open: Vec<(f64, f64, f64, f64)> = Vec::new();
    let mut done = Vec::new();
    for (row, strips) in ys.windows(2).zip(rows) {
        let mut next_open = Vec::with_capacity(strips.len());
        for (x0, x1) in strips {
            let matching = open.iter().position(|&(ox0, _, ox1, oy1)| {
                (ox0 - x0).abs() < EPSILON
                    && (ox1 - x1).abs() < EPSILON
                    && (oy1 - row[0]).abs() < EPSILON
            });
            match matching {
                Some(i) => {
                    let (ox0, oy0, ox1, _) = open.remove(i);
                    next_open.push((ox0, oy0, ox1, row[1]));
                }
                None => next_open.push((x0, row[0], x1, row[1])),
            }
        }
        done.append(&mut open);
        open = next_open;
    }
    done.append(&mut open);
    done
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestkit_core::{Part, PlacedPart};

    fn layout(parts: &[(f64, f64, f64, f64)]) -> SheetLayout {
        SheetLayout {
            index: 2,
            material: "MDF-18".to_string(),
            thickness: 18.0,
            width: 2000.0,
            height: 1500.0,
            placements: parts
                .iter()
                .enumerate()
                .map(|(i, &(x, y, l, w))| {
                    PlacedPart::new(Part::new(format!("p{i}"), l, w, 18.0, "MDF-18"), 2, x, y, false)
                })
                .collect(),
        }
    }

    fn parts_area(layout: &SheetLayout) -> f64 {
        layout.placements.iter().map(|p| p.length * p.width).sum()
    }

    #[test]
    fn test_remainder_conserves_area() {
        let layout = layout(&[(0.0, 0.0, 1000.0, 600.0), (1000.0, 0.0, 500.0, 900.0)]);
        let leftover = remainder(&layout);
        let total = leftover.unsigned_area() + parts_area(&layout);
        assert!((total - 2000.0 * 1500.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_box_per_region() {
        let layout = layout(&[(0.0, 0.0, 2000.0, 600.0)]);
        let offcuts = compute_offcuts(&layout, &PackingSettings::default());
        assert_eq!(offcuts.len(), 1);
        let o = &offcuts[0];
        assert_eq!((o.x, o.y, o.width, o.height), (0.0, 600.0, 2000.0, 900.0));
        assert_eq!(o.sheet_index, 2);
        assert_eq!(o.material, "MDF-18");
    }

    #[test]
    fn test_bounding_box_never_covers_a_part() {
        let layout = layout(&[(0.0, 0.0, 1000.0, 1000.0), (1200.0, 200.0, 400.0, 300.0)]);
        let offcuts = compute_offcuts(&layout, &PackingSettings::default());
        assert!(!offcuts.is_empty());

        for o in &offcuts {
            for placed in &layout.placements {
                let (x0, y0, x1, y1) = placed.bounds();
                let overlap_x = o.x < x1 - EPSILON && x0 < o.x + o.width - EPSILON;
                let overlap_y = o.y < y1 - EPSILON && y0 < o.y + o.height - EPSILON;
                assert!(!(overlap_x && overlap_y), "{o:?} covers {}", placed.part.name);
            }
        }
        let area: f64 = offcuts.iter().map(|o| o.area()).sum();
        assert!((area + parts_area(&layout) - 2000.0 * 1500.0).abs() < 1e-6);
    }

    #[test]
    fn test_exact_decomposition_covers_l_shape() {
        let layout = layout(&[(0.0, 0.0, 1000.0, 1000.0)]);
        let settings = PackingSettings {
            offcut_decomposition: OffcutDecomposition::Exact,
            ..PackingSettings::default()
        };
        let offcuts = compute_offcuts(&layout, &settings);
        assert_eq!(offcuts.len(), 2);

        let area: f64 = offcuts.iter().map(|o| o.area()).sum();
        assert!((area + parts_area(&layout) - 2000.0 * 1500.0).abs() < 1e-6);
        for (i, a) in offcuts.iter().enumerate() {
            for b in &offcuts[i + 1..] {
                let overlap_x = a.x < b.x + b.width - EPSILON && b.x < a.x + a.width - EPSILON;
                let overlap_y = a.y < b.y + b.height - EPSILON && b.y < a.y + a.height - EPSILON;
                assert!(!(overlap_x && overlap_y));
            }
        }
    }

    #[test]
    fn test_small_offcuts_are_discarded() {
        let layout = layout(&[(0.0, 0.0, 1990.0, 1500.0)]);
        let settings = PackingSettings {
            min_offcut_dimension: 50.0,
            ..PackingSettings::default()
        };
        assert!(compute_offcuts(&layout, &settings).is_empty());
        assert_eq!(compute_offcuts(&layout, &PackingSettings::default()).len(), 1);
    }

    #[test]
    fn test_full_sheet_has_no_offcuts() {
        let layout = layout(&[(0.0, 0.0, 2000.0, 1500.0)]);
        assert!(compute_offcuts(&layout, &PackingSettings::default()).is_empty());
    }
}
