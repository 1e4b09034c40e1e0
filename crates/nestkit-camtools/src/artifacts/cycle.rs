//! Shop-floor XML manifests
//!
//! One `.cyc` file per sheet lists the sheet's program, preview image,
//! parts with their labels, and offcut programs. `chapas.xml` indexes every
//! sheet of the job.

use crate::error::NestResult;
use nestkit_core::units::format_dimension;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::path::Path;

/// A part or offcut and its label file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRef {
    pub name: String,
    pub label: Option<String>,
}

/// What the manifests record about one sheet; file names are relative to
/// the output folder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleEntry {
    /// Counted from 1
    pub number: usize,
    pub material: String,
    pub thickness: f64,
    pub width: f64,
    pub height: f64,
    pub program: Option<String>,
    pub image: Option<String>,
    pub cycle: Option<String>,
    pub parts: Vec<LabelRef>,
    /// Offcut programs and labels
    pub offcuts: Vec<(String, Option<String>)>,
}

fn sheet_start(entry: &CycleEntry) -> BytesStart<'static> {
    let mut start = BytesStart::new("Sheet");
    start.push_attribute(("number", entry.number.to_string().as_str()));
    start.push_attribute(("material", entry.material.as_str()));
    start.push_attribute(("thickness", format_dimension(entry.thickness).as_str()));
    start.push_attribute(("width", format_dimension(entry.width).as_str()));
    start.push_attribute(("height", format_dimension(entry.height).as_str()));
    for (key, value) in [
        ("program", &entry.program),
        ("image", &entry.image),
        ("cycle", &entry.cycle),
    ] {
        if let Some(value) = value {
            start.push_attribute((key, value.as_str()));
        }
    }
    start
}

fn write_document<F>(path: &Path, root: &str, body: F) -> NestResult<()>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> NestResult<()>,
{
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new(root)))?;
    body(&mut writer)?;
    writer.write_event(Event::End(BytesEnd::new(root)))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Write the `.cyc` manifest of one sheet
pub fn write_cycle_manifest(path: &Path, entry: &CycleEntry) -> NestResult<()> {
    write_document(path, "Cycle", |writer| {
        writer.write_event(Event::Start(sheet_start(entry)))?;
        for part in &entry.parts {
            let mut element = BytesStart::new("Part");
            element.push_attribute(("name", part.name.as_str()));
            if let Some(label) = &part.label {
                element.push_attribute(("label", label.as_str()));
            }
            writer.write_event(Event::Empty(element))?;
        }
        for (program, label) in &entry.offcuts {
            let mut element = BytesStart::new("Offcut");
            element.push_attribute(("program", program.as_str()));
            if let Some(label) = label {
                element.push_attribute(("label", label.as_str()));
            }
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Sheet")))?;
        Ok(())
    })
}

/// Write `chapas.xml`, one element per sheet
pub fn write_sheet_index(path: &Path, entries: &[CycleEntry]) -> NestResult<()> {
    write_document(path, "Sheets", |writer| {
        for entry in entries {
            writer.write_event(Event::Empty(sheet_start(entry)))?;
        }
        Ok(())
    })
}
