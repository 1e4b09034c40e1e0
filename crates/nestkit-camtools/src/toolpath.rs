//! Toolpath Synthesizer
//!
//! Emits machine-program text for placed parts and offcuts using the
//! machine profile's templates. Synthesis is a fold over [`ToolState`]:
//! every call takes the currently loaded tool and hands back the state it
//! leaves behind, so parts can be emitted one at a time or in stages
//! (all holes of a sheet, then all mills, then all contours) without
//! reloading a tool the spindle already holds.
//!
//! Z is measured from the top of the sheet: positive above it, negative
//! into the material.

use crate::sheet_packer::SheetLayout;
use nestkit_core::units::{format_coord, format_dimension, format_rate};
use nestkit_core::{
    Face, MachineProfile, Offcut, Operation, PlacedPart, SlotOrientation, Tool, ToolCatalog,
    ToolKind,
};
use std::f64::consts::TAU;
use tracing::{debug, warn};

const SIZE_EPSILON: f64 = 1e-6;
/// Segments used to trace a hole wider than the tool
const HOLE_SEGMENTS: usize = 24;
/// Slot clearing passes overlap by half the tool diameter
const SLOT_STEP_RATIO: f64 = 0.5;

/// Which operations a synthesis call emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    All,
    Holes,
    /// Slots and other milling
    Mills,
    Contour,
}

impl Stage {
    fn admits(self, operation: &Operation) -> bool {
        match self {
            Self::All => true,
            Self::Holes => operation.is_hole(),
            Self::Mills => !operation.is_hole() && !operation.is_contour(),
            Self::Contour => operation.is_contour(),
        }
    }
}

/// The tool in the spindle and how many loads the program has seen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolState {
    pub current: Option<String>,
    pub loads: usize,
}

/// Generated program text plus the state it leaves behind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramChunk {
    pub gcode: String,
    pub state: ToolState,
    /// Descriptions of the tools used, first use first, no repeats
    pub tools_used: Vec<String>,
}

impl ProgramChunk {
    fn starting_from(state: ToolState) -> Self {
        Self {
            gcode: String::new(),
            state,
            tools_used: Vec::new(),
        }
    }

    /// Append a later chunk, taking over its state
    pub fn append(&mut self, next: ProgramChunk) {
        self.gcode.push_str(&next.gcode);
        self.state = next.state;
        for tool in next.tools_used {
            self.note_tool(tool);
        }
    }

    fn note_tool(&mut self, description: String) {
        if !self.tools_used.contains(&description) {
            self.tools_used.push(description);
        }
    }
}

/// Header block information for a complete program
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramHeader {
    /// Creation timestamp, already formatted
    pub created: String,
    pub job: String,
    pub material: String,
    pub thickness: f64,
    pub width: f64,
    pub height: f64,
}

/// Values substituted into a template
#[derive(Debug, Default, Clone, Copy)]
struct Tokens<'a> {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    feed: Option<f64>,
    tool: Option<&'a Tool>,
    diameter: Option<f64>,
    face: Option<Face>,
}

/// Read-only inputs shared by every synthesis call of a job
#[derive(Debug, Clone, Copy)]
pub struct SynthContext<'a> {
    pub profile: &'a MachineProfile,
    pub tools: &'a ToolCatalog,
}

impl<'a> SynthContext<'a> {
    pub fn new(profile: &'a MachineProfile, tools: &'a ToolCatalog) -> Self {
        Self { profile, tools }
    }

    fn coord(&self, value: f64) -> String {
        format_coord(value, self.profile.decimals)
    }

    fn render(&self, template: &str, tokens: &Tokens<'_>) -> String {
        let p = self.profile;
        let opt_coord = |v: Option<f64>| v.map(|v| self.coord(v)).unwrap_or_default();
        let replacements = [
            ("[X]", opt_coord(tokens.x)),
            ("[Y]", opt_coord(tokens.y)),
            ("[Z]", opt_coord(tokens.z)),
            ("[F]", tokens.feed.map(format_rate).unwrap_or_default()),
            ("[TD]", tokens.tool.map(|t| t.description.clone()).unwrap_or_default()),
            ("[T]", tokens.tool.map(|t| t.code.clone()).unwrap_or_default()),
            ("[S]", tokens.tool.map(|t| format_rate(t.spindle_speed)).unwrap_or_default()),
            (
                "[CMD]",
                tokens.tool.and_then(|t| t.command.clone()).unwrap_or_default(),
            ),
            ("[HX]", self.coord(p.home_x)),
            ("[HY]", self.coord(p.home_y)),
            ("[HZ]", self.coord(p.home_z)),
            ("[D]", opt_coord(tokens.diameter)),
            (
                "[FACE]",
                tokens.face.map(|f| f.number().to_string()).unwrap_or_default(),
            ),
        ];

        let mut text = template.to_string();
        for (token, value) in &replacements {
            if text.contains(token) {
                text = text.replace(token, value);
            }
        }

        let mut rendered = String::new();
        for line in text.lines().map(str::trim_end).filter(|l| !l.trim().is_empty()) {
            rendered.push_str(line);
            rendered.push('\n');
        }
        rendered
    }

    fn rapid(&self, out: &mut String, x: f64, y: f64, z: f64) {
        out.push_str(&self.render(
            &self.profile.rapid_template,
            &Tokens {
                x: Some(x),
                y: Some(y),
                z: Some(z),
                ..Tokens::default()
            },
        ));
    }

    fn cut(&self, out: &mut String, x: f64, y: f64, z: f64, feed: f64) {
        out.push_str(&self.render(
            &self.profile.cut_template,
            &Tokens {
                x: Some(x),
                y: Some(y),
                z: Some(z),
                feed: Some(feed),
                ..Tokens::default()
            },
        ));
    }

    /// Approach from safety height down to the pre-work height
    fn approach(&self, out: &mut String, x: f64, y: f64) {
        self.rapid(out, x, y, self.profile.safety_z);
        self.rapid(out, x, y, self.profile.pre_work_z);
    }

    fn retract(&self, out: &mut String, x: f64, y: f64) {
        self.rapid(out, x, y, self.profile.safety_z);
    }

    /// Emit a tool load unless `tool` is already in the spindle
    fn load_tool(&self, chunk: &mut ProgramChunk, tool: &Tool) {
        if chunk.state.current.as_deref() != Some(tool.code.as_str()) {
            let template = if chunk.state.loads == 0 {
                &self.profile.header_template
            } else {
                &self.profile.tool_change_template
            };
            chunk.gcode.push_str(&self.render(
                template,
                &Tokens {
                    tool: Some(tool),
                    ..Tokens::default()
                },
            ));
            debug!(tool = %tool.code, "Tool load");
            chunk.state = ToolState {
                current: Some(tool.code.clone()),
                loads: chunk.state.loads + 1,
            };
        }
        chunk.note_tool(tool.description.clone());
    }

    /// Tool serving an operation: a layer-rule tool first, then a matching
    /// catalog tool, then the first tool of a suitable kind.
    pub fn resolve_tool(&self, operation: &Operation) -> Option<&'a Tool> {
        if let Some(code) = operation.tool() {
            if let Some(tool) = self.tools.find(code) {
                return Some(tool);
            }
            warn!(tool = code, "Layer rule names an unknown tool; choosing by size");
        }
        match operation {
            Operation::Hole { diameter, .. } => self
                .tools
                .drill_for_diameter(*diameter)
                .or_else(|| self.tools.mill_for_width(*diameter))
                .or_else(|| self.tools.first_of_kind(ToolKind::Drill)),
            Operation::Slot { width, .. } => self
                .tools
                .mill_for_width(*width)
                .or_else(|| self.tools.first_of_kind(ToolKind::Mill)),
            Operation::Contour => self.contour_tool(),
        }
    }

    /// Cutter that routes part contours
    pub fn contour_tool(&self) -> Option<&'a Tool> {
        self.profile
            .contour_tool
            .as_deref()
            .and_then(|code| self.tools.find(code))
            .or_else(|| self.tools.first_of_kind(ToolKind::Mill))
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_hole(
        &self,
        out: &mut String,
        placed: &PlacedPart,
        tool: &Tool,
        diameter: f64,
        depth: f64,
        local: (f64, f64),
        face: Face,
    ) {
        let (x, y) = placed.to_sheet(local.0, local.1);

        if face.is_edge() {
            let Some(template) = &self.profile.edge_drill_template else {
                debug!(part = %placed.part.name, face = face.number(), "No edge drilling configured; hole skipped");
                return;
            };
            out.push_str(&self.render(
                template,
                &Tokens {
                    x: Some(x),
                    y: Some(y),
                    z: Some(-placed.part.thickness / 2.0),
                    feed: Some(self.profile.drill_feed),
                    tool: Some(tool),
                    diameter: Some(diameter),
                    face: Some(face),
                },
            ));
            return;
        }

        let radius = (diameter - tool.diameter) / 2.0;
        if radius <= SIZE_EPSILON {
            self.approach(out, x, y);
            self.cut(out, x, y, -depth, self.profile.drill_feed);
            self.retract(out, x, y);
            return;
        }

        // Wider than the tool: plunge on the ring and trace it
        self.approach(out, x + radius, y);
        self.cut(out, x + radius, y, -depth, self.profile.plunge_feed);
        for i in 1..=HOLE_SEGMENTS {
            let angle = TAU * i as f64 / HOLE_SEGMENTS as f64;
            self.cut(
                out,
                x + radius * angle.cos(),
                y + radius * angle.sin(),
                -depth,
                self.profile.cut_feed,
            );
        }
        self.retract(out, x + radius, y);
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_slot(
        &self,
        out: &mut String,
        placed: &PlacedPart,
        tool: &Tool,
        width: f64,
        depth: f64,
        start: (f64, f64),
        length: f64,
        orientation: SlotOrientation,
    ) {
        // Parallel passes across the slot width, alternating direction
        let spare = (width - tool.diameter).max(0.0);
        let passes = if spare <= SIZE_EPSILON {
            1
        } else {
            (spare / (tool.diameter * SLOT_STEP_RATIO)).ceil() as usize + 1
        };
        let step = if passes > 1 {
            spare / (passes - 1) as f64
        } else {
            0.0
        };

        let mut lines = Vec::with_capacity(passes);
        for i in 0..passes {
            let offset = -spare / 2.0 + step * i as f64;
            let (a, b) = match orientation {
                SlotOrientation::Horizontal => (
                    (start.0, start.1 + offset),
                    (start.0 + length, start.1 + offset),
                ),
                SlotOrientation::Vertical => (
                    (start.0 + offset, start.1),
                    (start.0 + offset, start.1 + length),
                ),
            };
            let (a, b) = (placed.to_sheet(a.0, a.1), placed.to_sheet(b.0, b.1));
            lines.push(if i % 2 == 0 { (a, b) } else { (b, a) });
        }

        let z = -depth;
        let Some(&((sx, sy), _)) = lines.first() else {
            return;
        };
        self.approach(out, sx, sy);
        self.cut(out, sx, sy, z, self.profile.plunge_feed);
        let mut end = (sx, sy);
        for ((ax, ay), (bx, by)) in lines {
            self.cut(out, ax, ay, z, self.profile.cut_feed);
            self.cut(out, bx, by, z, self.profile.cut_feed);
            end = (bx, by);
        }
        self.retract(out, end.0, end.1);
    }

    /// Trace a closed rectangle in stepped passes down to `total_depth`
    fn emit_rectangle(&self, out: &mut String, corners: [(f64, f64); 4], total_depth: f64) {
        let step = self.profile.contour_pass_depth;
        let passes = ((total_depth / step) - SIZE_EPSILON).ceil().max(1.0) as usize;
        let (sx, sy) = corners[0];

        self.approach(out, sx, sy);
        for pass in 1..=passes {
            let z = -(step * pass as f64).min(total_depth);
            self.cut(out, sx, sy, z, self.profile.plunge_feed);
            for &(x, y) in corners[1..].iter().chain(std::iter::once(&corners[0])) {
                self.cut(out, x, y, z, self.profile.cut_feed);
            }
        }
        self.retract(out, sx, sy);
    }

    fn emit_contour(&self, out: &mut String, placed: &PlacedPart, tool: &Tool) {
        let r = tool.radius();
        let (l, w) = (placed.part.length, placed.part.width);
        let corners = [(-r, -r), (l + r, -r), (l + r, w + r), (-r, w + r)]
            .map(|(x, y)| placed.to_sheet(x, y));
        self.emit_rectangle(
            out,
            corners,
            placed.part.thickness + self.profile.breakthrough,
        );
    }
}

/// Emit the operations of one placed part admitted by `stage`
pub fn synthesize_part(
    ctx: &SynthContext<'_>,
    placed: &PlacedPart,
    stage: Stage,
    state: ToolState,
) -> ProgramChunk {
    let mut chunk = ProgramChunk::starting_from(state);

    for operation in placed.part.operations_in_order() {
        if !stage.admits(&operation) {
            continue;
        }
        if operation.face().is_edge() && ctx.profile.edge_drill_template.is_none() {
            debug!(part = %placed.part.name, "Edge operation skipped; no edge drilling configured");
            continue;
        }
        let Some(tool) = ctx.resolve_tool(&operation) else {
            warn!(part = %placed.part.name, ?operation, "No tool can serve operation; skipped");
            continue;
        };

        ctx.load_tool(&mut chunk, tool);
        match operation {
            Operation::Hole {
                diameter,
                depth,
                x,
                y,
                face,
                ..
            } => ctx.emit_hole(&mut chunk.gcode, placed, tool, diameter, depth, (x, y), face),
            Operation::Slot {
                width,
                depth,
                x,
                y,
                length,
                orientation,
                ..
            } => ctx.emit_slot(
                &mut chunk.gcode,
                placed,
                tool,
                width,
                depth,
                (x, y),
                length,
                orientation,
            ),
            Operation::Contour => ctx.emit_contour(&mut chunk.gcode, placed, tool),
        }
    }

    chunk
}

/// Contour program for one offcut; traced inside its rectangle so the
/// neighbouring parts are untouched
pub fn synthesize_offcut_contour(
    ctx: &SynthContext<'_>,
    offcut: &Offcut,
    state: ToolState,
) -> ProgramChunk {
    let mut chunk = ProgramChunk::starting_from(state);
    let Some(tool) = ctx.contour_tool() else {
        warn!(sheet = offcut.sheet_index, "No contour tool; offcut not cut");
        return chunk;
    };
    let r = tool.radius();
    if offcut.width <= 2.0 * r || offcut.height <= 2.0 * r {
        debug!(sheet = offcut.sheet_index, "Offcut narrower than the tool; not cut");
        return chunk;
    }

    ctx.load_tool(&mut chunk, tool);
    let (x0, y0) = (offcut.x + r, offcut.y + r);
    let (x1, y1) = (offcut.x + offcut.width - r, offcut.y + offcut.height - r);
    ctx.emit_rectangle(
        &mut chunk.gcode,
        [(x0, y0), (x1, y0), (x1, y1), (x0, y1)],
        offcut.thickness + ctx.profile.breakthrough,
    );
    chunk
}

/// Whole-sheet body: every part's holes, then every part's mills, then
/// every contour, then the offcut contours
pub fn synthesize_sheet(
    ctx: &SynthContext<'_>,
    layout: &SheetLayout,
    offcuts: &[Offcut],
) -> ProgramChunk {
    let mut program = ProgramChunk::default();
    for stage in [Stage::Holes, Stage::Mills, Stage::Contour] {
        for placed in &layout.placements {
            let next = synthesize_part(ctx, placed, stage, program.state.clone());
            program.append(next);
        }
    }
    for offcut in offcuts {
        let next = synthesize_offcut_contour(ctx, offcut, program.state.clone());
        program.append(next);
    }
    program
}

/// Complete program: `%`, comment header, body, footer, `%`
pub fn render_program(ctx: &SynthContext<'_>, header: &ProgramHeader, body: &ProgramChunk) -> String {
    let mut out = String::from("%\n");
    out.push_str(&format!("; Created: {}\n", header.created));
    out.push_str(&format!("; Post-processor: {}\n", ctx.profile.name));
    out.push_str(&format!("; Job: {}\n", header.job));
    out.push_str(&format!(
        "; Material: {} {}mm\n",
        header.material,
        format_dimension(header.thickness)
    ));
    out.push_str(&format!(
        "; Dimensions: {} x {}\n",
        format_dimension(header.width),
        format_dimension(header.height)
    ));
    out.push_str("; Tools:\n");
    for tool in &body.tools_used {
        out.push_str(&format!(";   {}\n", tool));
    }
    out.push_str(&body.gcode);
    out.push_str(&ctx.render(&ctx.profile.footer_template, &Tokens::default()));
    out.push_str("%\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestkit_core::{default_tools, Part};

    fn hole(diameter: f64, x: f64, y: f64) -> Operation {
        Operation::Hole {
            diameter,
            depth: 12.0,
            x,
            y,
            face: Face::Top,
            tool: None,
        }
    }

    fn placed(part: Part) -> PlacedPart {
        PlacedPart::new(part, 0, 0.0, 0.0, false)
    }

    fn tool_loads(gcode: &str) -> usize {
        gcode.lines().filter(|l| l.contains(" M6")).count()
    }

    #[test]
    fn test_repeated_tool_is_loaded_once() {
        let profile = MachineProfile::default();
        let tools = ToolCatalog::from_tools(default_tools());
        let ctx = SynthContext::new(&profile, &tools);

        // Sorted by Y the holes need 8mm, 8mm, 5mm, 8mm
        let mut part = Part::new("side", 600.0, 300.0, 18.0, "MDF-18");
        part.operations = vec![
            hole(8.0, 50.0, 10.0),
            hole(8.0, 50.0, 20.0),
            hole(5.0, 50.0, 30.0),
            hole(8.0, 50.0, 40.0),
        ];

        let chunk = synthesize_part(&ctx, &placed(part), Stage::Holes, ToolState::default());
        assert_eq!(tool_loads(&chunk.gcode), 3);
        assert_eq!(chunk.gcode.matches("G90 G21 G17").count(), 1);
        assert_eq!(chunk.state.current.as_deref(), Some("2"));
        assert_eq!(chunk.state.loads, 3);
        assert_eq!(chunk.tools_used, vec!["Broca 8mm", "Broca 5mm"]);
    }

    #[test]
    fn test_state_threads_across_parts() {
        let profile = MachineProfile::default();
        let tools = ToolCatalog::from_tools(default_tools());
        let ctx = SynthContext::new(&profile, &tools);
        let part = Part::new("a", 500.0, 300.0, 18.0, "MDF-18");

        let first = synthesize_part(&ctx, &placed(part.clone()), Stage::Contour, ToolState::default());
        let second = synthesize_part(&ctx, &placed(part), Stage::Contour, first.state.clone());
        assert_eq!(tool_loads(&first.gcode), 1);
        assert_eq!(tool_loads(&second.gcode), 0);
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn test_stage_filters_operations() {
        let profile = MachineProfile::default();
        let tools = ToolCatalog::from_tools(default_tools());
        let ctx = SynthContext::new(&profile, &tools);
        let mut part = Part::new("side", 600.0, 300.0, 18.0, "MDF-18");
        part.operations = vec![hole(8.0, 50.0, 10.0)];

        let mills = synthesize_part(&ctx, &placed(part.clone()), Stage::Mills, ToolState::default());
        assert!(mills.gcode.is_empty());
        assert_eq!(mills.state, ToolState::default());

        let all = synthesize_part(&ctx, &placed(part), Stage::All, ToolState::default());
        assert_eq!(all.tools_used, vec!["Broca 8mm", "Fresa 6mm"]);
    }

    #[test]
    fn test_contour_steps_down_through_the_sheet() {
        let profile = MachineProfile::default();
        let tools = ToolCatalog::from_tools(default_tools());
        let ctx = SynthContext::new(&profile, &tools);
        let part = Part::new("a", 500.0, 300.0, 18.0, "MDF-18");

        let chunk = synthesize_part(&ctx, &placed(part), Stage::Contour, ToolState::default());
        // 18.3mm in passes of at most 10mm
        assert!(chunk.gcode.contains("Z-10.000 F"));
        assert!(chunk.gcode.contains("Z-18.300 F"));
        // Offset outward by the 3mm tool radius
        assert!(chunk.gcode.contains("G1 X503.000 Y303.000 Z-18.300 F6000"));
        assert!(chunk.gcode.contains("G0 X-3.000 Y-3.000 Z20.000"));
    }

    #[test]
    fn test_wide_slot_gets_parallel_passes() {
        let profile = MachineProfile::default();
        let tools = ToolCatalog::from_tools(default_tools());
        let ctx = SynthContext::new(&profile, &tools);
        let mut part = Part::new("back", 600.0, 300.0, 18.0, "MDF-18");
        part.operations = vec![Operation::Slot {
            width: 12.0,
            depth: 8.0,
            x: 0.0,
            y: 100.0,
            length: 600.0,
            orientation: SlotOrientation::Horizontal,
            face: Face::Top,
            tool: None,
        }];

        let chunk = synthesize_part(&ctx, &placed(part), Stage::Mills, ToolState::default());
        // 6mm spare at a 3mm step: offsets -3, 0, +3
        assert!(chunk.gcode.contains("G1 X600.000 Y97.000 Z-8.000"));
        assert!(chunk.gcode.contains("G1 X0.000 Y100.000 Z-8.000"));
        assert!(chunk.gcode.contains("G1 X600.000 Y103.000 Z-8.000"));
    }

    #[test]
    fn test_edge_holes_need_a_template() {
        let mut profile = MachineProfile::default();
        let tools = ToolCatalog::from_tools(default_tools());
        let mut part = Part::new("side", 600.0, 300.0, 18.0, "MDF-18");
        part.operations = vec![Operation::Hole {
            diameter: 8.0,
            depth: 20.0,
            x: 32.0,
            y: 0.0,
            face: Face::Front,
            tool: None,
        }];

        let ctx = SynthContext::new(&profile, &tools);
        let chunk = synthesize_part(&ctx, &placed(part.clone()), Stage::Holes, ToolState::default());
        assert!(chunk.gcode.is_empty());

        profile.edge_drill_template = Some("BORE F[FACE] X[X] Y[Y] Z[Z] D[D]".to_string());
        let ctx = SynthContext::new(&profile, &tools);
        let chunk = synthesize_part(&ctx, &placed(part), Stage::Holes, ToolState::default());
        assert!(chunk.gcode.contains("BORE F1 X32.000 Y0.000 Z-9.000 D8.000"));
    }

    #[test]
    fn test_rendered_program_header_and_footer() {
        let profile = MachineProfile::default();
        let tools = ToolCatalog::from_tools(default_tools());
        let ctx = SynthContext::new(&profile, &tools);
        let part = Part::new("a", 500.0, 300.0, 18.0, "MDF-18");
        let body = synthesize_part(&ctx, &placed(part), Stage::All, ToolState::default());
        let header = ProgramHeader {
            created: "2024-01-01 08:00:00".to_string(),
            job: "cozinha".to_string(),
            material: "MDF-18".to_string(),
            thickness: 18.0,
            width: 2750.0,
            height: 1850.0,
        };

        let program = render_program(&ctx, &header, &body);
        assert!(program.starts_with("%\n; Created: 2024-01-01 08:00:00\n"));
        assert!(program.contains("; Post-processor: nestkit-generic\n"));
        assert!(program.contains("; Dimensions: 2750 x 1850\n"));
        assert!(program.contains(";   Fresa 6mm\n"));
        assert!(program.ends_with("M5\nG0 Z50.000\nG0 X0.000 Y0.000\nM30\n%\n"));
        // Empty [CMD] lines are dropped
        assert!(!program.contains("\n\n"));
    }
}
