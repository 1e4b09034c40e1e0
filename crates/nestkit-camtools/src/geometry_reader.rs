//! Geometry Reader
//!
//! Loads a part's DXF file and measures its true size from the outer contour
//! layer (`borda_externa` / `contorno`). The contour's lower-left corner
//! becomes the part-local origin for every operation the extractor finds.
//!
//! A DXF that cannot be parsed is not fatal: the part keeps the dimensions
//! declared in the manifest. A DXF that does not exist at all is.

use crate::dxt::ManifestEntry;
use crate::error::{NestError, NestResult};
use dxf::entities::EntityType;
use nestkit_core::is_contour_layer;
use std::path::Path;
use tracing::{debug, warn};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_point(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Geometric primitive read from a DXF, in drawing coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Polyline { points: Vec<(f64, f64)>, closed: bool },
    Circle { cx: f64, cy: f64, radius: f64 },
    /// Angles in degrees, counter-clockwise from start to end
    Arc {
        cx: f64,
        cy: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
}

impl Primitive {
    /// Bounding box; arcs are bounded by their swept extent only
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Self::Line { x1, y1, x2, y2 } => {
                let mut b = Bounds::from_point(*x1, *y1);
                b.include(*x2, *y2);
                Some(b)
            }
            Self::Polyline { points, .. } => {
                let (first, rest) = points.split_first()?;
                let mut b = Bounds::from_point(first.0, first.1);
                for (x, y) in rest {
                    b.include(*x, *y);
                }
                Some(b)
            }
            Self::Circle { cx, cy, radius } => Some(Bounds {
                min_x: cx - radius,
                min_y: cy - radius,
                max_x: cx + radius,
                max_y: cy + radius,
            }),
            Self::Arc {
                cx,
                cy,
                radius,
                start_angle,
                end_angle,
            } => Some(arc_bounds(*cx, *cy, *radius, *start_angle, *end_angle)),
        }
    }
}

fn arc_bounds(cx: f64, cy: f64, radius: f64, start_angle: f64, end_angle: f64) -> Bounds {
    let point_at = |deg: f64| {
        let rad = deg.to_radians();
        (cx + radius * rad.cos(), cy + radius * rad.sin())
    };
    let start = start_angle.rem_euclid(360.0);
    let mut sweep = (end_angle - start_angle).rem_euclid(360.0);
    if sweep == 0.0 {
        sweep = 360.0;
    }

    let (sx, sy) = point_at(start);
    let mut bounds = Bounds::from_point(sx, sy);
    let (ex, ey) = point_at(start + sweep);
    bounds.include(ex, ey);

    // Axis extremes crossed by the sweep
    let mut quadrant = (start / 90.0).floor() * 90.0 + 90.0;
    while quadrant < start + sweep {
        let (qx, qy) = point_at(quadrant);
        bounds.include(qx, qy);
        quadrant += 90.0;
    }
    bounds
}

/// A primitive and the layer it was drawn on
#[derive(Debug, Clone, PartialEq)]
pub struct CadEntity {
    pub layer: String,
    pub primitive: Primitive,
}

/// Geometry of one part after dimension resolution
#[derive(Debug, Clone, PartialEq)]
pub struct PartGeometry {
    /// X extent
    pub length: f64,
    /// Y extent
    pub width: f64,
    /// Drawing coordinates of the part-local origin
    pub origin: (f64, f64),
    /// Everything read from the DXF (empty when it was unreadable)
    pub entities: Vec<CadEntity>,
    /// Whether the dimensions came from the contour layer
    pub from_cad: bool,
}

fn entity_to_primitive(entity_type: &EntityType) -> Option<Primitive> {
    match entity_type {
        EntityType::Line(line) => Some(Primitive::Line {
            x1: line.p1.x,
            y1: line.p1.y,
            x2: line.p2.x,
            y2: line.p2.y,
        }),
        EntityType::Circle(circle) => Some(Primitive::Circle {
            cx: circle.center.x,
            cy: circle.center.y,
            radius: circle.radius,
        }),
        EntityType::Arc(arc) => Some(Primitive::Arc {
            cx: arc.center.x,
            cy: arc.center.y,
            radius: arc.radius,
            start_angle: arc.start_angle,
            end_angle: arc.end_angle,
        }),
        EntityType::LwPolyline(polyline) => {
            if polyline.vertices.is_empty() {
                return None;
            }
            Some(Primitive::Polyline {
                points: polyline.vertices.iter().map(|v| (v.x, v.y)).collect(),
                // Bit 0 (value 1) indicates closed
                closed: polyline.flags & 1 != 0,
            })
        }
        EntityType::Polyline(polyline) => {
            let points: Vec<(f64, f64)> = polyline
                .vertices()
                .map(|v| (v.location.x, v.location.y))
                .collect();
            if points.is_empty() {
                return None;
            }
            Some(Primitive::Polyline {
                points,
                closed: polyline.flags & 1 != 0,
            })
        }
        _ => None,
    }
}

/// Read every supported primitive of a DXF file
pub fn read_cad_file(path: &Path) -> NestResult<Vec<CadEntity>> {
    if !path.is_file() {
        return Err(NestError::InputNotFound(path.to_path_buf()));
    }
    let drawing = dxf::Drawing::load_file(path).map_err(|e| NestError::GeometryUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(drawing
        .entities()
        .filter_map(|entity| {
            entity_to_primitive(&entity.specific).map(|primitive| CadEntity {
                layer: entity.common.layer.clone(),
                primitive,
            })
        })
        .collect())
}

/// Bounding box of everything drawn on contour layers
pub fn contour_bounds(entities: &[CadEntity]) -> Option<Bounds> {
    entities
        .iter()
        .filter(|e| is_contour_layer(&e.layer))
        .filter_map(|e| e.primitive.bounds())
        .reduce(Bounds::union)
}

/// Resolve a manifest entry's true dimensions from its CAD file
pub fn resolve_geometry(entry: &ManifestEntry, job_dir: &Path) -> NestResult<PartGeometry> {
    let path = job_dir.join(&entry.filename);
    let declared = PartGeometry {
        length: entry.length,
        width: entry.width,
        origin: (0.0, 0.0),
        entities: Vec::new(),
        from_cad: false,
    };

    let entities = match read_cad_file(&path) {
        Ok(entities) => entities,
        Err(err @ NestError::GeometryUnreadable { .. }) => {
            warn!(part = %entry.part_name, "{}; using manifest dimensions", err);
            return Ok(declared);
        }
        Err(err) => return Err(err),
    };

    match contour_bounds(&entities) {
        Some(bounds) if bounds.width() > 0.0 && bounds.height() > 0.0 => {
            debug!(
                part = %entry.part_name,
                length = bounds.width(),
                width = bounds.height(),
                "Dimensions read from contour layer"
            );
            Ok(PartGeometry {
                length: bounds.width(),
                width: bounds.height(),
                origin: (bounds.min_x, bounds.min_y),
                entities,
                from_cad: true,
            })
        }
        _ => {
            debug!(part = %entry.part_name, "No contour layer; using manifest dimensions");
            Ok(PartGeometry {
                entities,
                ..declared
            })
        }
    }
}
