//! Job pipeline
//!
//! Two entry points drive a job folder through the engine:
//!
//! - [`pack_and_generate`] reads the manifest and CAD files, packs the parts
//!   and writes every program and artifact to `<job>/output`;
//! - [`preview_layout`] stops after packing and returns the layout in
//!   memory, for review before anything is cut.
//!
//! All inputs are read before the output folder is touched, so a missing
//! manifest or CAD file leaves no output behind. Re-running a job
//! replaces its previous output: numbered sheet files left from an earlier
//! run are removed first, so no stale program survives.

use crate::artifacts::{
    labels::LabelValues, render_label, render_sheet_preview, save_raster, write_cycle_manifest,
    write_sheet_index, CycleEntry, LabelRef,
};
use crate::bpp::read_listing_for;
use crate::dxt::{find_manifest, read_manifest, ManifestEntry};
use crate::error::NestResult;
use crate::geometry_reader::resolve_geometry;
use crate::guillotine::{plan_guillotine, GuillotinePlan};
use crate::offcut::compute_offcuts;
use crate::operation_extractor::extract_operations;
use crate::sheet_packer::{pack_parts, PackingOptions, SheetLayout};
use crate::toolpath::{
    render_program, synthesize_offcut_contour, synthesize_sheet, ProgramHeader, SynthContext,
    ToolState,
};
use nestkit_core::units::format_dimension;
use nestkit_core::{LayerResolver, Offcut, Part};
use nestkit_settings::Catalog;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the output folder inside the job folder
pub const OUTPUT_DIR: &str = "output";
/// Sheet index written for every job
pub const SHEET_INDEX_FILE: &str = "chapas.xml";
/// Straight-cut plan written in guillotine mode
pub const CUT_LIST_FILE: &str = "cortes.json";
const LABELS_DIR: &str = "labels";

/// What to nest and how
#[derive(Debug, Clone, PartialEq)]
pub struct NestingRequest {
    /// Folder holding the `.dxt` manifest and the DXF files
    pub job_dir: PathBuf,
    /// Sheet size for materials missing from the sheet catalog
    pub sheet_width: f64,
    pub sheet_height: f64,
    pub allow_rotation: bool,
    /// Plan straight cuts only, without toolpaths
    pub guillotine: bool,
    /// Creation stamp written into program headers; the current time when unset
    pub timestamp: Option<String>,
}

impl NestingRequest {
    pub fn new(job_dir: impl Into<PathBuf>, sheet_width: f64, sheet_height: f64) -> Self {
        Self {
            job_dir: job_dir.into(),
            sheet_width,
            sheet_height,
            allow_rotation: true,
            guillotine: false,
            timestamp: None,
        }
    }

    fn job_name(&self) -> String {
        self.job_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "job".to_string())
    }

    fn packing_options(&self, catalog: &Catalog) -> PackingOptions {
        let options = PackingOptions::new(self.sheet_width, self.sheet_height, self.allow_rotation)
            .with_settings(&catalog.packing);
        if self.guillotine {
            return options;
        }
        // Contours are routed outside the part outline
        let tools = catalog.tool_catalog();
        let cutter = SynthContext::new(&catalog.machine, &tools)
            .contour_tool()
            .map(|tool| tool.diameter)
            .unwrap_or_default();
        options.with_tool_clearance(cutter)
    }
}

/// Program file and offcuts of one sheet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetOutcome {
    pub file: PathBuf,
    pub offcuts: Vec<Offcut>,
}

/// Result of [`pack_and_generate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub output_dir: PathBuf,
    pub sheets: Vec<SheetOutcome>,
    /// Material groups that could not be packed, with the reason
    pub failed_groups: Vec<String>,
}

/// A packed sheet and its offcuts, without any files
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetPreview {
    pub layout: SheetLayout,
    pub offcuts: Vec<Offcut>,
    pub utilization: f64,
}

/// Result of [`preview_layout`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutPreview {
    pub sheets: Vec<SheetPreview>,
    /// Set instead of `sheets` in guillotine mode
    pub guillotine: Option<GuillotinePlan>,
    pub failed_groups: Vec<String>,
}

/// Sheet file stem: `NNN-<material><thickness>mm`
pub fn sheet_stem(number: usize, material: &str, thickness: f64) -> String {
    format!(
        "{:03}-{}{}mm",
        number,
        sanitize_file_name(material),
        format_dimension(thickness)
    )
}

fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn part_from_entry(entry: &ManifestEntry, name: String, length: f64, width: f64) -> Part {
    Part {
        name,
        filename: entry.filename.clone(),
        length,
        width,
        thickness: entry.thickness,
        material: entry.material.clone(),
        client: entry.client.clone(),
        project: entry.project.clone(),
        comment: entry.comment.clone(),
        program_code: entry.program_code.clone(),
        operations: Vec::new(),
    }
}

/// Read the manifest and every CAD file of a job into parts.
///
/// A part with quantity `n` becomes `n` parts named `name`, `name (2)`...
pub fn load_parts(job_dir: &Path, catalog: &Catalog) -> NestResult<Vec<Part>> {
    let manifest = find_manifest(job_dir)?;
    let entries = read_manifest(&manifest)?;
    let rules = catalog.layer_rule_set()?;
    let mut resolver = LayerResolver::new(&rules);
    let mut parts = Vec::new();

    for entry in &entries {
        let geometry = resolve_geometry(entry, job_dir)?;
        let mut part = part_from_entry(entry, entry.part_name.clone(), geometry.length, geometry.width);

        let mut operations = extract_operations(&part, &geometry, &mut resolver);
        for op in read_listing_for(&job_dir.join(&entry.filename), part.width)? {
            match op.origin() {
                Some((x, y)) if part.contains_point(x, y) => operations.push(op),
                _ => warn!(part = %part.name, "BPP operation outside the part; dropped"),
            }
        }
        part.operations = operations;
        part.validate()?;

        let copies: Vec<Part> = (2..=entry.quantity)
            .map(|copy| {
                let mut extra = part.clone();
                extra.name = format!("{} ({})", part.name, copy);
                extra
            })
            .collect();
        parts.push(part);
        parts.extend(copies);
    }

    info!(
        manifest = %manifest.display(),
        parts = parts.len(),
        "Loaded job"
    );
    Ok(parts)
}

fn creation_stamp(request: &NestingRequest) -> String {
    request
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Numbered sheet artifacts (`NNN-...`) and the job-level files
fn is_generated(name: &str) -> bool {
    let bytes = name.as_bytes();
    let numbered = bytes.len() > 4 && bytes[..3].iter().all(u8::is_ascii_digit) && bytes[3] == b'-';
    numbered || name == SHEET_INDEX_FILE || name == CUT_LIST_FILE
}

fn remove_generated(dir: &Path) -> NestResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let stale = entry.file_type()?.is_file() && is_generated(&entry.file_name().to_string_lossy());
        if stale {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn prepare_output_dir(job_dir: &Path) -> NestResult<PathBuf> {
    let output_dir = job_dir.join(OUTPUT_DIR);
    let labels_dir = output_dir.join(LABELS_DIR);
    fs::create_dir_all(&labels_dir)?;
    remove_generated(&output_dir)?;
    remove_generated(&labels_dir)?;
    debug!(dir = %output_dir.display(), "Cleared previous output");
    Ok(output_dir)
}

/// Pack a job and write its programs, images and manifests.
///
/// Fails only when an input is missing, when no material group could be
/// packed at all, or when writing an output fails.
pub fn pack_and_generate(request: &NestingRequest, catalog: &Catalog) -> NestResult<JobOutcome> {
    catalog.validate()?;
    let parts = load_parts(&request.job_dir, catalog)?;
    let options = request.packing_options(catalog);
    let sheets = catalog.sheet_catalog();

    if request.guillotine {
        let plan = plan_guillotine(&parts, &sheets, &options);
        return write_guillotine_outputs(request, &plan);
    }

    let mut packing = pack_parts(&parts, &sheets, &options);
    if packing.sheets.is_empty() && !packing.failures.is_empty() {
        return Err(packing.failures.remove(0));
    }
    let failed_groups: Vec<String> = packing.failures.iter().map(|e| e.to_string()).collect();

    let output_dir = prepare_output_dir(&request.job_dir)?;
    let tools = catalog.tool_catalog();
    let profile = &catalog.machine;
    let ctx = SynthContext::new(profile, &tools);
    let created = creation_stamp(request);
    let job = request.job_name();
    let label_layout = profile.label_layout.clone().unwrap_or_default();

    let mut outcomes = Vec::with_capacity(packing.sheets.len());
    let mut index_entries = Vec::with_capacity(packing.sheets.len());

    for layout in &packing.sheets {
        let number = layout.index + 1;
        let stem = sheet_stem(number, &layout.material, layout.thickness);
        let offcuts = compute_offcuts(layout, &catalog.packing);
        let header = |width: f64, height: f64| ProgramHeader {
            created: created.clone(),
            job: job.clone(),
            material: layout.material.clone(),
            thickness: layout.thickness,
            width,
            height,
        };

        let body = synthesize_sheet(&ctx, layout, &offcuts);
        let program_file = format!("{stem}.nc");
        let program_path = output_dir.join(&program_file);
        fs::write(
            &program_path,
            render_program(&ctx, &header(layout.width, layout.height), &body),
        )?;

        let mut offcut_refs = Vec::with_capacity(offcuts.len());
        for (k, offcut) in offcuts.iter().enumerate() {
            let offcut_stem = format!("{stem}-sobra{}", k + 1);
            let chunk = synthesize_offcut_contour(&ctx, offcut, ToolState::default());
            fs::write(
                output_dir.join(format!("{offcut_stem}.nc")),
                render_program(&ctx, &header(offcut.width, offcut.height), &chunk),
            )?;
            let label = match &profile.label_layout {
                Some(offcut_layout) => {
                    let image = render_label(offcut_layout, &LabelValues::for_offcut(offcut, k + 1));
                    let path = save_raster(
                        image,
                        &output_dir.join(LABELS_DIR).join(format!("{:03}-sobra{}", number, k + 1)),
                        &profile.label_image,
                    )?;
                    Some(relative_name(&output_dir, &path))
                }
                None => None,
            };
            offcut_refs.push((format!("{offcut_stem}.nc"), label));
        }

        let preview = render_sheet_preview(layout, &offcuts, profile.preview_width_px);
        let image_path = save_raster(preview, &output_dir.join(&stem), &profile.sheet_image)?;

        let mut part_refs = Vec::with_capacity(layout.placements.len());
        for placed in &layout.placements {
            let image = render_label(&label_layout, &LabelValues::for_part(placed, number));
            let path = save_raster(
                image,
                &output_dir.join(LABELS_DIR).join(format!(
                    "{:03}-{}",
                    number,
                    sanitize_file_name(&placed.part.name)
                )),
                &profile.label_image,
            )?;
            part_refs.push(LabelRef {
                name: placed.part.name.clone(),
                label: Some(relative_name(&output_dir, &path)),
            });
        }

        let cycle_file = format!("{stem}.cyc");
        let entry = CycleEntry {
            number,
            material: layout.material.clone(),
            thickness: layout.thickness,
            width: layout.width,
            height: layout.height,
            program: Some(program_file),
            image: Some(relative_name(&output_dir, &image_path)),
            cycle: Some(cycle_file.clone()),
            parts: part_refs,
            offcuts: offcut_refs,
        };
        write_cycle_manifest(&output_dir.join(&cycle_file), &entry)?;
        index_entries.push(entry);

        info!(sheet = number, file = %program_path.display(), offcuts = offcuts.len(), "Wrote sheet");
        outcomes.push(SheetOutcome {
            file: program_path,
            offcuts,
        });
    }

    write_sheet_index(&output_dir.join(SHEET_INDEX_FILE), &index_entries)?;

    Ok(JobOutcome {
        output_dir,
        sheets: outcomes,
        failed_groups,
    })
}

fn write_guillotine_outputs(request: &NestingRequest, plan: &GuillotinePlan) -> NestResult<JobOutcome> {
    let output_dir = prepare_output_dir(&request.job_dir)?;
    let cut_list = output_dir.join(CUT_LIST_FILE);
    fs::write(&cut_list, serde_json::to_string_pretty(plan)?)?;

    let entries: Vec<CycleEntry> = plan
        .sheets
        .iter()
        .map(|sheet| CycleEntry {
            number: sheet.index + 1,
            material: sheet.material.clone(),
            thickness: sheet.thickness,
            width: sheet.width,
            height: sheet.height,
            program: None,
            image: None,
            cycle: None,
            parts: sheet
                .cuts
                .iter()
                .map(|cut| LabelRef {
                    name: cut.part.clone(),
                    label: None,
                })
                .collect(),
            offcuts: Vec::new(),
        })
        .collect();
    write_sheet_index(&output_dir.join(SHEET_INDEX_FILE), &entries)?;

    info!(sheets = plan.sheets.len(), file = %cut_list.display(), "Wrote straight-cut plan");
    Ok(JobOutcome {
        output_dir,
        sheets: plan
            .sheets
            .iter()
            .map(|_| SheetOutcome {
                file: cut_list.clone(),
                offcuts: Vec::new(),
            })
            .collect(),
        failed_groups: unplaced_messages(plan),
    })
}

fn unplaced_messages(plan: &GuillotinePlan) -> Vec<String> {
    plan.unplaced
        .iter()
        .map(|name| format!("Part '{}' does not fit on a sheet", name))
        .collect()
}

/// Pack a job without writing anything
pub fn preview_layout(request: &NestingRequest, catalog: &Catalog) -> NestResult<LayoutPreview> {
    catalog.validate()?;
    let parts = load_parts(&request.job_dir, catalog)?;
    let options = request.packing_options(catalog);
    let sheets = catalog.sheet_catalog();

    if request.guillotine {
        let plan = plan_guillotine(&parts, &sheets, &options);
        return Ok(LayoutPreview {
            sheets: Vec::new(),
            failed_groups: unplaced_messages(&plan),
            guillotine: Some(plan),
        });
    }

    let packing = pack_parts(&parts, &sheets, &options);
    Ok(LayoutPreview {
        sheets: packing
            .sheets
            .into_iter()
            .map(|layout| SheetPreview {
                offcuts: compute_offcuts(&layout, &catalog.packing),
                utilization: layout.utilization(),
                layout,
            })
            .collect(),
        guillotine: None,
        failed_groups: packing.failures.iter().map(|e| e.to_string()).collect(),
    })
}

fn relative_name(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
