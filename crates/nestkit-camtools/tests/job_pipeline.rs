use dxf::entities::{Circle, Entity, EntityType, Line};
use dxf::{Drawing, Point};
use nestkit_camtools::pipeline::{load_parts, pack_and_generate, preview_layout, NestingRequest};
use nestkit_camtools::NestError;
use nestkit_settings::{Catalog, OffcutDecomposition};
use std::fs;
use std::path::Path;

struct PartSpec<'a> {
    file: &'a str,
    name: &'a str,
    length: f64,
    width: f64,
    quantity: u32,
}

fn write_manifest(dir: &Path, material: &str, parts: &[PartSpec<'_>]) {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<PartData>\n");
    for part in parts {
        xml.push_str("  <Part>\n");
        for (name, value) in [
            ("Filename", part.file.to_string()),
            ("PartName", part.name.to_string()),
            ("Length", part.length.to_string()),
            ("Width", part.width.to_string()),
            ("Thickness", "18".to_string()),
            ("Material", material.to_string()),
            ("Quantity", part.quantity.to_string()),
        ] {
            xml.push_str(&format!(
                "    <Field Name=\"{}\" Type=\"String\" Value=\"{}\"/>\n",
                name, value
            ));
        }
        xml.push_str("  </Part>\n");
    }
    xml.push_str("</PartData>\n");
    fs::write(dir.join("job.dxt"), xml).unwrap();
}

fn on_layer(specific: EntityType, layer: &str) -> Entity {
    let mut entity = Entity::new(specific);
    entity.common.layer = layer.to_string();
    entity
}

fn line(x1: f64, y1: f64, x2: f64, y2: f64, layer: &str) -> Entity {
    on_layer(
        EntityType::Line(Line::new(Point::new(x1, y1, 0.0), Point::new(x2, y2, 0.0))),
        layer,
    )
}

/// DXF with a rectangular contour and any extra entities
fn write_part_dxf(path: &Path, length: f64, width: f64, extra: Vec<Entity>) {
    let mut drawing = Drawing::new();
    for entity in [
        line(0.0, 0.0, length, 0.0, "CONTORNO"),
        line(length, 0.0, length, width, "CONTORNO"),
        line(length, width, 0.0, width, "CONTORNO"),
        line(0.0, width, 0.0, 0.0, "CONTORNO"),
    ]
    .into_iter()
    .chain(extra)
    {
        drawing.add_entity(entity);
    }
    drawing.save_file(path).unwrap();
}

fn request(dir: &Path) -> NestingRequest {
    let mut request = NestingRequest::new(dir, 2750.0, 1850.0);
    request.timestamp = Some("2024-01-01 00:00:00".to_string());
    request
}

fn two_part_job(dir: &Path) {
    write_manifest(
        dir,
        "MDF-18",
        &[
            PartSpec {
                file: "lateral.dxf",
                name: "Lateral",
                length: 700.0,
                width: 500.0,
                quantity: 1,
            },
            PartSpec {
                file: "base.dxf",
                name: "Base",
                length: 900.0,
                width: 450.0,
                quantity: 1,
            },
        ],
    );
    write_part_dxf(&dir.join("lateral.dxf"), 700.0, 500.0, Vec::new());
    write_part_dxf(&dir.join("base.dxf"), 900.0, 450.0, Vec::new());
}

#[test]
fn test_cad_dimensions_override_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "MDF-18",
        &[PartSpec {
            file: "porta.dxf",
            name: "Porta",
            length: 500.0,
            width: 300.0,
            quantity: 2,
        }],
    );
    write_part_dxf(&dir.path().join("porta.dxf"), 600.0, 400.0, Vec::new());

    let parts = load_parts(dir.path(), &Catalog::default()).unwrap();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "Porta");
    assert_eq!(parts[1].name, "Porta (2)");
    assert_eq!((parts[0].length, parts[0].width), (600.0, 400.0));
}

#[test]
fn test_unreadable_cad_falls_back_to_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "MDF-18",
        &[PartSpec {
            file: "broken.dxf",
            name: "Tampo",
            length: 800.0,
            width: 550.0,
            quantity: 1,
        }],
    );
    fs::write(dir.path().join("broken.dxf"), "garbage\nthat is not\na drawing\n").unwrap();

    let parts = load_parts(dir.path(), &Catalog::default()).unwrap();
    assert_eq!((parts[0].length, parts[0].width), (800.0, 550.0));
}

#[test]
fn test_missing_cad_file_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "MDF-18",
        &[PartSpec {
            file: "absent.dxf",
            name: "Fundo",
            length: 800.0,
            width: 550.0,
            quantity: 1,
        }],
    );

    let err = pack_and_generate(&request(dir.path()), &Catalog::default()).unwrap_err();
    assert!(matches!(err, NestError::InputNotFound(_)));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_placements_stay_on_sheet_without_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let specs: Vec<(String, f64, f64)> = (0..12)
        .map(|i| (format!("p{i}"), 300.0 + 50.0 * i as f64, 200.0 + 30.0 * (i % 4) as f64))
        .collect();
    let parts: Vec<PartSpec<'_>> = specs
        .iter()
        .map(|(name, l, w)| PartSpec {
            file: "none.dxf",
            name,
            length: *l,
            width: *w,
            quantity: 1,
        })
        .collect();
    write_manifest(dir.path(), "MDP-15", &parts);
    fs::write(dir.path().join("none.dxf"), "not a drawing").unwrap();

    let mut catalog = Catalog::default();
    catalog.packing.part_spacing = 6.0;
    let preview = preview_layout(&request(dir.path()), &catalog).unwrap();
    let placements: Vec<_> = preview
        .sheets
        .iter()
        .flat_map(|s| s.layout.placements.iter())
        .collect();
    assert_eq!(placements.len(), 12);

    for sheet in &preview.sheets {
        for (i, a) in sheet.layout.placements.iter().enumerate() {
            let (x0, y0, x1, y1) = a.bounds();
            assert!(x0 >= 0.0 && y0 >= 0.0);
            assert!(x1 <= sheet.layout.width + 1e-9 && y1 <= sheet.layout.height + 1e-9);
            for b in &sheet.layout.placements[i + 1..] {
                assert!(!a.overlaps(b), "{} overlaps {}", a.part.name, b.part.name);
            }
        }
    }
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_offcuts_and_parts_cover_the_sheet() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());

    let mut catalog = Catalog::default();
    catalog.packing.offcut_decomposition = OffcutDecomposition::Exact;
    let preview = preview_layout(&request(dir.path()), &catalog).unwrap();

    for sheet in &preview.sheets {
        let parts: f64 = sheet
            .layout
            .placements
            .iter()
            .map(|p| p.length * p.width)
            .sum();
        let offcuts: f64 = sheet.offcuts.iter().map(|o| o.width * o.height).sum();
        let total = sheet.layout.width * sheet.layout.height;
        assert!((parts + offcuts - total).abs() < total * 1e-9);
    }
}

#[test]
fn test_packing_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());
    let mut req = request(dir.path());
    req.allow_rotation = false;

    let first = preview_layout(&req, &Catalog::default()).unwrap();
    let second = preview_layout(&req, &Catalog::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_two_parts_share_one_program_and_one_tool_load() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());

    let mut catalog = Catalog::default();
    // Keep the program to the two part contours
    catalog.packing.min_offcut_dimension = 10_000.0;
    let outcome = pack_and_generate(&request(dir.path()), &catalog).unwrap();

    assert_eq!(outcome.sheets.len(), 1);
    let program_path = &outcome.sheets[0].file;
    assert_eq!(
        program_path.file_name().and_then(|n| n.to_str()),
        Some("001-MDF-1818mm.nc")
    );
    let nc_files = fs::read_dir(&outcome.output_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "nc"))
        .count();
    assert_eq!(nc_files, 1);

    let program = fs::read_to_string(program_path).unwrap();
    assert!(program.starts_with("%\n; Created: 2024-01-01 00:00:00\n"));
    assert!(program.trim_end().ends_with('%'));
    assert_eq!(program.matches(" M6").count(), 1);
    assert!(!program.contains("M5\nG0 Z50.000\nT"));
    // Each contour block rapids to safety height on approach and on retract
    let safety_rapids = program
        .lines()
        .filter(|l| l.starts_with("G0 X") && l.ends_with("Z20.000"))
        .count();
    assert_eq!(safety_rapids, 4);

    let output = &outcome.output_dir;
    assert!(output.join("001-MDF-1818mm.cyc").is_file());
    assert!(output.join("001-MDF-1818mm.png").is_file());
    assert!(output.join("chapas.xml").is_file());
    assert!(output.join("labels").join("001-Lateral.png").is_file());
    assert!(output.join("labels").join("001-Base.png").is_file());
}

#[test]
fn test_configured_precision_applies_to_every_move() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "MDF-18",
        &[PartSpec {
            file: "gaveta.dxf",
            name: "Gaveta",
            length: 600.0,
            width: 400.0,
            quantity: 1,
        }],
    );
    write_part_dxf(
        &dir.path().join("gaveta.dxf"),
        600.0,
        400.0,
        vec![
            line(100.0, 200.0, 400.0, 200.0, "SLOT_50_10"),
            on_layer(
                EntityType::Circle(Circle::new(Point::new(50.0, 50.0, 0.0), 4.0)),
                "HOLE_8_12",
            ),
        ],
    );

    let mut catalog = Catalog::default();
    catalog.machine.decimals = 4;
    let outcome = pack_and_generate(&request(dir.path()), &catalog).unwrap();
    let program = fs::read_to_string(&outcome.sheets[0].file).unwrap();

    let moves: Vec<&str> = program
        .lines()
        .filter(|l| l.starts_with("G0 ") || l.starts_with("G1 "))
        .collect();
    assert!(moves.len() > 10);
    for line in moves {
        for word in line.split_whitespace() {
            if let Some(value) = word.strip_prefix(['X', 'Y', 'Z']) {
                let decimals = value.split_once('.').map(|(_, d)| d.len());
                assert_eq!(decimals, Some(4), "{line}");
            }
        }
    }
    // Drill for the hole, mill for the slot and contour
    assert_eq!(program.matches(" M6").count(), 2);
}

#[test]
fn test_rerun_overwrites_output() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());
    let catalog = Catalog::default();

    let first = pack_and_generate(&request(dir.path()), &catalog).unwrap();
    let program = fs::read_to_string(&first.sheets[0].file).unwrap();
    let second = pack_and_generate(&request(dir.path()), &catalog).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second.sheets[0].file).unwrap(), program);
}

#[test]
fn test_guillotine_mode_writes_cut_list_only() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());
    let mut req = request(dir.path());
    req.guillotine = true;

    let outcome = pack_and_generate(&req, &Catalog::default()).unwrap();
    let output = &outcome.output_dir;
    let cuts: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output.join("cortes.json")).unwrap()).unwrap();
    assert_eq!(cuts["sheets"][0]["cuts"].as_array().map(Vec::len), Some(2));
    assert!(output.join("chapas.xml").is_file());
    assert!(!output.join("001-MDF-1818mm.nc").exists());
}

#[test]
fn test_default_offcuts_never_cover_parts() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());

    let preview = preview_layout(&request(dir.path()), &Catalog::default()).unwrap();
    for sheet in &preview.sheets {
        assert!(!sheet.offcuts.is_empty());
        for offcut in &sheet.offcuts {
            for placed in &sheet.layout.placements {
                let (x0, y0, x1, y1) = placed.bounds();
                let overlap_x = offcut.x < x1 - 1e-6 && x0 < offcut.x + offcut.width - 1e-6;
                let overlap_y = offcut.y < y1 - 1e-6 && y0 < offcut.y + offcut.height - 1e-6;
                assert!(!(overlap_x && overlap_y), "{offcut:?} covers {}", placed.part.name);
            }
        }

        let parts: f64 = sheet.layout.placements.iter().map(|p| p.length * p.width).sum();
        let offcuts: f64 = sheet.offcuts.iter().map(|o| o.width * o.height).sum();
        let total = sheet.layout.width * sheet.layout.height;
        assert!((parts + offcuts - total).abs() < total * 1e-9);
    }
}

#[test]
fn test_default_contours_stay_on_sheet_and_off_other_parts() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());
    let catalog = Catalog::default();

    let preview = preview_layout(&request(dir.path()), &catalog).unwrap();
    let outcome = pack_and_generate(&request(dir.path()), &catalog).unwrap();
    let layout = &preview.sheets[0].layout;
    let program = fs::read_to_string(&outcome.sheets[0].file).unwrap();

    let mut checked = 0;
    for line in program.lines().filter(|l| l.starts_with("G0 ") || l.starts_with("G1 ")) {
        let word = |axis: char| {
            line.split_whitespace()
                .find_map(|w| w.strip_prefix(axis))
                .and_then(|v| v.parse::<f64>().ok())
        };
        let (Some(x), Some(y)) = (word('X'), word('Y')) else {
            continue;
        };
        assert!(x >= -1e-6 && x <= layout.width + 1e-6, "{line}");
        assert!(y >= -1e-6 && y <= layout.height + 1e-6, "{line}");
        for placed in &layout.placements {
            let (x0, y0, x1, y1) = placed.bounds();
            let inside = x > x0 + 1e-6 && x < x1 - 1e-6 && y > y0 + 1e-6 && y < y1 - 1e-6;
            assert!(!inside, "{line} cuts into {}", placed.part.name);
        }
        checked += 1;
    }
    assert!(checked > 8);
}

#[test]
fn test_invalid_catalog_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());
    let mut catalog = Catalog::default();
    catalog.machine.contour_pass_depth = 0.0;

    let err = pack_and_generate(&request(dir.path()), &catalog).unwrap_err();
    assert!(matches!(err, NestError::Settings(_)));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn test_rerun_removes_stale_sheet_files() {
    let dir = tempfile::tempdir().unwrap();
    two_part_job(dir.path());
    let labels = dir.path().join("output").join("labels");
    fs::create_dir_all(&labels).unwrap();
    let stale_program = dir.path().join("output").join("099-MDF-1818mm-sobra7.nc");
    let stale_label = labels.join("099-Old.png");
    let notes = dir.path().join("output").join("notes.txt");
    fs::write(&stale_program, "%\n%\n").unwrap();
    fs::write(&stale_label, "png").unwrap();
    fs::write(&notes, "keep me").unwrap();

    let outcome = pack_and_generate(&request(dir.path()), &Catalog::default()).unwrap();
    assert!(outcome.sheets[0].file.is_file());
    assert!(!stale_program.exists());
    assert!(!stale_label.exists());
    assert!(notes.is_file());
}
