//! Parts, machining operations and placements
//!
//! A [`Part`] is read once from the job manifest and never mutated by the
//! pipeline. Packing wraps it in a [`PlacedPart`], which knows where the part
//! sits on its sheet and how to map part-local coordinates onto the sheet.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

const BOUNDS_EPSILON: f64 = 1e-6;

/// Face of the panel an operation is machined from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Face {
    /// Upper face, reachable by the router spindle
    Top,
    /// Front edge (y = 0)
    Front,
    /// Right edge (x = length)
    Right,
    /// Back edge (y = width)
    Back,
    /// Left edge (x = 0)
    Left,
}

impl Face {
    /// Face number as used by machine listings (0 = top, 1..=4 = edges)
    pub fn number(self) -> u8 {
        match self {
            Self::Top => 0,
            Self::Front => 1,
            Self::Right => 2,
            Self::Back => 3,
            Self::Left => 4,
        }
    }

    /// Inverse of [`Face::number`]
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(Self::Top),
            1 => Some(Self::Front),
            2 => Some(Self::Right),
            3 => Some(Self::Back),
            4 => Some(Self::Left),
            _ => None,
        }
    }

    /// Whether the operation is machined from the panel edge
    pub fn is_edge(self) -> bool {
        self != Self::Top
    }
}

impl Default for Face {
    fn default() -> Self {
        Self::Top
    }
}

/// Direction a slot runs in, in unrotated part coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotOrientation {
    /// Runs along +X from its origin
    Horizontal,
    /// Runs along +Y from its origin
    Vertical,
}

/// A machining operation in part-local coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// Drilled hole centred at (x, y)
    Hole {
        diameter: f64,
        depth: f64,
        x: f64,
        y: f64,
        face: Face,
        /// Tool code fixed by a layer rule
        tool: Option<String>,
    },
    /// Straight groove starting at (x, y)
    Slot {
        width: f64,
        depth: f64,
        x: f64,
        y: f64,
        length: f64,
        orientation: SlotOrientation,
        face: Face,
        tool: Option<String>,
    },
    /// Outer boundary cut that frees the part
    Contour,
}

impl Operation {
    /// Whether this is a hole
    pub fn is_hole(&self) -> bool {
        matches!(self, Self::Hole { .. })
    }

    /// Whether this is the contour pass
    pub fn is_contour(&self) -> bool {
        matches!(self, Self::Contour)
    }

    /// Local reference point, if the operation has one
    pub fn origin(&self) -> Option<(f64, f64)> {
        match self {
            Self::Hole { x, y, .. } | Self::Slot { x, y, .. } => Some((*x, *y)),
            Self::Contour => None,
        }
    }

    /// Local end point of a slot
    pub fn slot_end(&self) -> Option<(f64, f64)> {
        match self {
            Self::Slot {
                x,
                y,
                length,
                orientation,
                ..
            } => Some(match orientation {
                SlotOrientation::Horizontal => (x + length, *y),
                SlotOrientation::Vertical => (*x, y + length),
            }),
            _ => None,
        }
    }

    /// Face the operation is machined from; the contour is always cut from the top
    pub fn face(&self) -> Face {
        match self {
            Self::Hole { face, .. } | Self::Slot { face, .. } => *face,
            Self::Contour => Face::Top,
        }
    }

    /// Tool code fixed by a layer rule, if any
    pub fn tool(&self) -> Option<&str> {
        match self {
            Self::Hole { tool, .. } | Self::Slot { tool, .. } => tool.as_deref(),
            Self::Contour => None,
        }
    }
}

/// A part as described by the job manifest and its CAD file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    /// CAD file the geometry was read from
    pub filename: String,
    /// X extent in mm
    pub length: f64,
    /// Y extent in mm
    pub width: f64,
    pub thickness: f64,
    pub material: String,
    pub client: String,
    pub project: String,
    pub comment: String,
    /// Job tracking code (`Program1` in the manifest)
    pub program_code: String,
    /// Holes and slots; the contour is implicit
    pub operations: Vec<Operation>,
}

impl Part {
    /// Create a part with no operations
    pub fn new(name: impl Into<String>, length: f64, width: f64, thickness: f64, material: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: String::new(),
            length,
            width,
            thickness,
            material: material.into(),
            client: String::new(),
            project: String::new(),
            comment: String::new(),
            program_code: String::new(),
            operations: Vec::new(),
        }
    }

    /// Rectangle area in mm²
    pub fn area(&self) -> f64 {
        self.length * self.width
    }

    /// Check dimensions and that every operation lies within the part
    pub fn validate(&self) -> Result<()> {
        if self.length <= 0.0 || self.width <= 0.0 {
            return Err(Error::InvalidDimensions {
                name: self.name.clone(),
                length: self.length,
                width: self.width,
            });
        }
        for op in &self.operations {
            let mut points = Vec::with_capacity(2);
            points.extend(op.origin());
            points.extend(op.slot_end());
            for (x, y) in points {
                if !self.contains_point(x, y) {
                    return Err(Error::OperationOutOfBounds {
                        part: self.name.clone(),
                        x,
                        y,
                        length: self.length,
                        width: self.width,
                    });
                }
            }
        }
        Ok(())
    }

    /// Whether a part-local point lies within `[0, length] x [0, width]`
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= -BOUNDS_EPSILON
            && y >= -BOUNDS_EPSILON
            && x <= self.length + BOUNDS_EPSILON
            && y <= self.width + BOUNDS_EPSILON
    }

    /// Holes sorted by Y then X, then slots, then the contour
    pub fn operations_in_order(&self) -> Vec<Operation> {
        let mut holes: Vec<Operation> = self
            .operations
            .iter()
            .filter(|op| op.is_hole())
            .cloned()
            .collect();
        holes.sort_by(|a, b| {
            let (ax, ay) = a.origin().unwrap_or_default();
            let (bx, by) = b.origin().unwrap_or_default();
            a.face()
                .cmp(&b.face())
                .then(ay.total_cmp(&by))
                .then(ax.total_cmp(&bx))
        });

        let mut ordered = holes;
        ordered.extend(
            self.operations
                .iter()
                .filter(|op| !op.is_hole() && !op.is_contour())
                .cloned(),
        );
        ordered.push(Operation::Contour);
        ordered
    }
}

/// A part placed on a sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedPart {
    pub part: Part,
    pub sheet_index: usize,
    /// Sheet-relative origin of the part's lower-left corner
    pub x: f64,
    pub y: f64,
    /// Rotated 90° counter-clockwise
    pub rotated: bool,
    /// Effective X extent on the sheet
    pub length: f64,
    /// Effective Y extent on the sheet
    pub width: f64,
}

impl PlacedPart {
    /// Place a part; effective size is swapped when rotated
    pub fn new(part: Part, sheet_index: usize, x: f64, y: f64, rotated: bool) -> Self {
        let (length, width) = if rotated {
            (part.width, part.length)
        } else {
            (part.length, part.width)
        };
        Self {
            part,
            sheet_index,
            x,
            y,
            rotated,
            length,
            width,
        }
    }

    /// Map a part-local point onto the sheet
    pub fn to_sheet(&self, local_x: f64, local_y: f64) -> (f64, f64) {
        if self.rotated {
            (self.x + self.part.width - local_y, self.y + local_x)
        } else {
            (self.x + local_x, self.y + local_y)
        }
    }

    /// Sheet-space bounds as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.x + self.length, self.y + self.width)
    }

    /// Whether two placements' rectangles overlap (touching edges do not count)
    pub fn overlaps(&self, other: &PlacedPart) -> bool {
        let (ax0, ay0, ax1, ay1) = self.bounds();
        let (bx0, by0, bx1, by1) = other.bounds();
        ax0 < bx1 - BOUNDS_EPSILON
            && bx0 < ax1 - BOUNDS_EPSILON
            && ay0 < by1 - BOUNDS_EPSILON
            && by0 < ay1 - BOUNDS_EPSILON
    }
}
