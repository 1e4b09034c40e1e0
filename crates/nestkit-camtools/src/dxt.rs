//! DXT part-list manifest reader
//!
//! A manifest lists one `Part` per panel, each carrying `Field` entries with
//! `Name`, `Type` and `Value`. Exporters disagree on whether those three are
//! attributes or child elements, so both forms are accepted:
//!
//! ```xml
//! <PartData>
//!   <Part>
//!     <Field Name="PartName" Type="String" Value="Lateral"/>
//!     <Field><Name>Length</Name><Type>Real</Type><Value>600</Value></Field>
//!   </Part>
//! </PartData>
//! ```

use crate::error::{NestError, NestResult};
use nestkit_core::units::parse_decimal;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

/// Copies of one part a manifest may ask for
pub const MAX_QUANTITY: u32 = 10_000;

/// One `Part` record of the manifest
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// CAD file, relative to the job folder
    pub filename: String,
    pub part_name: String,
    pub length: f64,
    pub width: f64,
    pub thickness: f64,
    pub material: String,
    pub client: String,
    pub project: String,
    pub comment: String,
    /// `Program1`: numeric job-tracking code
    pub program_code: String,
    pub quantity: u32,
}

impl ManifestEntry {
    fn from_fields(fields: &HashMap<String, String>) -> NestResult<Self> {
        let text = |key: &str| fields.get(key).map(|v| v.trim().to_string());
        let part_name = text("partname").unwrap_or_default();
        let required = |key: &str, label: &str| {
            text(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    NestError::Manifest(format!(
                        "part '{}' is missing required field '{}'",
                        part_name, label
                    ))
                })
        };
        let number = |key: &str, label: &str| -> NestResult<f64> {
            let raw = required(key, label)?;
            parse_decimal(&raw).ok_or_else(|| {
                NestError::Manifest(format!(
                    "part '{}': field '{}' is not a number: '{}'",
                    part_name, label, raw
                ))
            })
        };

        let filename = required("filename", "Filename")?;
        let part_name = required("partname", "PartName")?;
        let quantity = match text("quantity").and_then(|q| parse_decimal(&q)) {
            None => 1,
            Some(q) if q.is_finite() && q.fract() == 0.0 && q <= MAX_QUANTITY as f64 => {
                q.max(1.0) as u32
            }
            Some(q) => {
                return Err(NestError::Manifest(format!(
                    "part '{}': quantity {} is not a whole number between 1 and {}",
                    part_name, q, MAX_QUANTITY
                )))
            }
        };

        Ok(Self {
            filename,
            length: number("length", "Length")?,
            width: number("width", "Width")?,
            thickness: number("thickness", "Thickness")?,
            material: required("material", "Material")?,
            client: text("client").unwrap_or_default(),
            project: text("project").unwrap_or_default(),
            comment: text("comment").unwrap_or_default(),
            program_code: text("program1").unwrap_or_default(),
            quantity,
            part_name,
        })
    }
}

#[derive(Debug, Default)]
struct RawField {
    name: String,
    value: String,
}

impl RawField {
    fn from_attributes(start: &BytesStart<'_>) -> NestResult<Self> {
        let mut field = Self::default();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let value = attr.unescape_value()?.into_owned();
            field.set(attr.key.as_ref(), value);
        }
        Ok(field)
    }

    fn set(&mut self, key: &[u8], value: String) {
        match key {
            b"Name" | b"name" => self.name = value,
            b"Value" | b"value" => self.value = value,
            _ => {}
        }
    }
}

/// Read and parse a manifest file
pub fn read_manifest(path: &Path) -> NestResult<Vec<ManifestEntry>> {
    if !path.is_file() {
        return Err(NestError::InputNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_manifest(&content)
}

/// Parse manifest XML
pub fn parse_manifest(xml: &str) -> NestResult<Vec<ManifestEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut part: Option<HashMap<String, String>> = None;
    let mut field: Option<RawField> = None;
    let mut child: Option<Vec<u8>> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Part" => part = Some(HashMap::new()),
                b"Field" => field = Some(RawField::from_attributes(&e)?),
                other if field.is_some() => child = Some(other.to_vec()),
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"Field" {
                    let raw = RawField::from_attributes(&e)?;
                    if let Some(fields) = part.as_mut() {
                        fields.insert(raw.name.to_lowercase(), raw.value);
                    }
                }
            }
            Event::Text(t) => {
                if let (Some(f), Some(key)) = (field.as_mut(), child.as_deref()) {
                    f.set(key, t.unescape()?.into_owned());
                }
            }
            Event::CData(c) => {
                if let (Some(f), Some(key)) = (field.as_mut(), child.as_deref()) {
                    f.set(key, String::from_utf8_lossy(&c.into_inner()).into_owned());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"Field" => {
                    if let (Some(raw), Some(fields)) = (field.take(), part.as_mut()) {
                        fields.insert(raw.name.to_lowercase(), raw.value);
                    }
                    child = None;
                }
                b"Part" => {
                    if let Some(fields) = part.take() {
                        entries.push(ManifestEntry::from_fields(&fields)?);
                    }
                }
                _ => child = None,
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if entries.is_empty() {
        return Err(NestError::Manifest("manifest lists no parts".to_string()));
    }
    Ok(entries)
}

/// Find the manifest of a job folder (the first `*.dxt` file by name)
pub fn find_manifest(job_dir: &Path) -> NestResult<std::path::PathBuf> {
    if !job_dir.is_dir() {
        return Err(NestError::InputNotFound(job_dir.to_path_buf()));
    }
    let mut manifests: Vec<_> = std::fs::read_dir(job_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("dxt"))
        })
        .collect();
    manifests.sort();
    manifests
        .into_iter()
        .next()
        .ok_or_else(|| NestError::InputNotFound(job_dir.join("*.dxt")))
}
