//! BPP machining listings
//!
//! Some jobs ship a machine-level listing next to each DXF (`<stem>.bpp`)
//! declaring drilling by raw field position:
//!
//! ```text
//! @ BH, "", "", 80000016, "" : 1, "1", 32, 0, 9, 12, 8
//! @ BV, "", "", 80000017, "" : 0, "1", 100, 50, 0, 12, 5
//! ```
//!
//! After the colon the fields are `face, "ref", x, y, z, depth, diameter`.
//! `BH` lines are horizontal (edge) bores; every face-1 bore is mirrored to
//! face 3 with its Y flipped. `BV` lines on face 0 are plain top holes.

use crate::error::NestResult;
use nestkit_core::{Face, Operation};
use std::path::Path;
use tracing::{debug, trace};

const FIELD_FACE: usize = 0;
const FIELD_X: usize = 2;
const FIELD_Y: usize = 3;
const FIELD_DEPTH: usize = 5;
const FIELD_DIAMETER: usize = 6;

/// Read the listing beside a DXF, if there is one
pub fn read_listing_for(dxf_path: &Path, part_width: f64) -> NestResult<Vec<Operation>> {
    let path = dxf_path.with_extension("bpp");
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)?;
    let operations = parse_listing(&content, part_width);
    debug!(path = %path.display(), count = operations.len(), "Read BPP listing");
    Ok(operations)
}

/// Parse listing text into hole operations
pub fn parse_listing(content: &str, part_width: f64) -> Vec<Operation> {
    let mut operations = Vec::new();

    for line in content.lines().map(str::trim) {
        let Some(rest) = line.strip_prefix('@') else {
            continue;
        };
        let Some((head, fields)) = rest.split_once(':') else {
            continue;
        };
        let kind = head.split(',').next().map(str::trim).unwrap_or_default();
        let fields: Vec<&str> = fields
            .split(',')
            .map(|f| f.trim().trim_matches('"'))
            .collect();

        let number = |index: usize| fields.get(index).and_then(|f| f.parse::<f64>().ok());
        let (Some(face), Some(x), Some(y), Some(depth), Some(diameter)) = (
            number(FIELD_FACE),
            number(FIELD_X),
            number(FIELD_Y),
            number(FIELD_DEPTH),
            number(FIELD_DIAMETER),
        ) else {
            trace!(line, "Skipping incomplete BPP line");
            continue;
        };
        if !(0.0..=4.0).contains(&face) || face.fract() != 0.0 {
            trace!(line, face, "Skipping BPP line with an unknown face");
            continue;
        }
        let Some(face) = Face::from_number(face as u8) else {
            continue;
        };

        let hole = |face: Face, y: f64| Operation::Hole {
            diameter,
            depth,
            x,
            y,
            face,
            tool: None,
        };

        match (kind, face) {
            ("BH", Face::Front) => {
                operations.push(hole(Face::Front, y));
                operations.push(hole(Face::Back, part_width - y));
            }
            ("BH", face) if face.is_edge() => operations.push(hole(face, y)),
            ("BV", Face::Top) => operations.push(hole(Face::Top, y)),
            _ => trace!(line, "Unsupported BPP operation"),
        }
    }

    operations
}
