//! Operation Extractor
//!
//! Turns the entities of a part's DXF into machining operations in
//! part-local coordinates. Each layer is resolved once through the job's
//! [`LayerResolver`]; circles on hole layers become holes and lines or
//! polylines on slot layers become slots. Layers that resolve to nothing are
//! skipped without comment.

use crate::geometry_reader::{Bounds, CadEntity, PartGeometry, Primitive};
use nestkit_core::{Face, LayerResolver, Operation, OperationKind, Part, SlotOrientation};
use tracing::{trace, warn};

/// Extent below which a slot's bounding box counts as degenerate
const DEGENERATE_EPSILON: f64 = 1e-3;

/// Extract holes and slots for `part` from its resolved geometry.
///
/// Coordinates are shifted by the contour origin, negative offsets wrap to
/// the far edge, and anything still outside the part is dropped with a
/// warning.
pub fn extract_operations(
    part: &Part,
    geometry: &PartGeometry,
    resolver: &mut LayerResolver<'_>,
) -> Vec<Operation> {
    let mut operations = Vec::new();

    for entity in &geometry.entities {
        let layer_match = resolver.resolve(&entity.layer).clone();
        let operation = match layer_match.kind {
            OperationKind::Hole { diameter, depth } => {
                hole_from_entity(entity, geometry.origin, diameter, depth, layer_match.tool)
            }
            OperationKind::Slot { width, depth } => {
                slot_from_entity(entity, geometry.origin, width, depth, layer_match.tool)
            }
            OperationKind::Contour | OperationKind::Ignore => None,
        };

        let Some(operation) = operation else {
            trace!(layer = %entity.layer, "Entity carries no operation");
            continue;
        };

        let operation = wrap_into_part(operation, part.length, part.width);
        if fits_part(&operation, part) {
            operations.push(operation);
        } else {
            warn!(
                part = %part.name,
                layer = %entity.layer,
                "Operation lies outside the part after wrapping; dropped"
            );
        }
    }

    operations
}

fn hole_from_entity(
    entity: &CadEntity,
    origin: (f64, f64),
    diameter: f64,
    depth: f64,
    tool: Option<String>,
) -> Option<Operation> {
    match entity.primitive {
        Primitive::Circle { cx, cy, .. } => Some(Operation::Hole {
            diameter,
            depth,
            x: cx - origin.0,
            y: cy - origin.1,
            face: Face::Top,
            tool,
        }),
        _ => None,
    }
}

fn slot_from_entity(
    entity: &CadEntity,
    origin: (f64, f64),
    width: f64,
    depth: f64,
    tool: Option<String>,
) -> Option<Operation> {
    let bounds = match entity.primitive {
        Primitive::Line { .. } | Primitive::Polyline { .. } => entity.primitive.bounds()?,
        _ => return None,
    };
    let Bounds {
        min_x,
        min_y,
        max_x,
        max_y,
    } = bounds;
    let (dx, dy) = (bounds.width(), bounds.height());

    // A flat box gives the slot line directly; a drawn rectangle is reduced
    // to its centre line along the longer side.
    let (x, y, length, orientation) = if dx < DEGENERATE_EPSILON && dy < DEGENERATE_EPSILON {
        return None;
    } else if dy < DEGENERATE_EPSILON {
        (min_x, min_y, dx, SlotOrientation::Horizontal)
    } else if dx < DEGENERATE_EPSILON {
        (min_x, min_y, dy, SlotOrientation::Vertical)
    } else if dx >= dy {
        (min_x, (min_y + max_y) / 2.0, dx, SlotOrientation::Horizontal)
    } else {
        ((min_x + max_x) / 2.0, min_y, dy, SlotOrientation::Vertical)
    };

    Some(Operation::Slot {
        width,
        depth,
        x: x - origin.0,
        y: y - origin.1,
        length,
        orientation,
        face: Face::Top,
        tool,
    })
}

/// Fold negative offsets back inside by adding the full part dimension
fn wrap_into_part(operation: Operation, length: f64, width: f64) -> Operation {
    let wrap = |value: f64, dimension: f64| {
        if value < 0.0 {
            value + dimension
        } else {
            value
        }
    };
    match operation {
        Operation::Hole {
            diameter,
            depth,
            x,
            y,
            face,
            tool,
        } => Operation::Hole {
            diameter,
            depth,
            x: wrap(x, length),
            y: wrap(y, width),
            face,
            tool,
        },
        Operation::Slot {
            width: slot_width,
            depth,
            x,
            y,
            length: slot_length,
            orientation,
            face,
            tool,
        } => Operation::Slot {
            width: slot_width,
            depth,
            x: wrap(x, length),
            y: wrap(y, width),
            length: slot_length,
            orientation,
            face,
            tool,
        },
        Operation::Contour => Operation::Contour,
    }
}

fn fits_part(operation: &Operation, part: &Part) -> bool {
    operation
        .origin()
        .into_iter()
        .chain(operation.slot_end())
        .all(|(x, y)| part.contains_point(x, y))
}
