use nestkit_core::{Face, Operation, Part, PlacedPart};

fn hole(x: f64, y: f64) -> Operation {
    Operation::Hole {
        diameter: 5.0,
        depth: 12.0,
        x,
        y,
        face: Face::Top,
        tool: None,
    }
}

#[test]
fn test_rotated_part_corners_stay_inside_its_footprint() {
    let part = Part::new("Prateleira", 800.0, 300.0, 18.0, "MDF-18");
    let placed = PlacedPart::new(part, 0, 100.0, 50.0, true);
    let (x0, y0, x1, y1) = placed.bounds();
    assert_eq!((x1 - x0, y1 - y0), (300.0, 800.0));

    for (lx, ly) in [(0.0, 0.0), (800.0, 0.0), (800.0, 300.0), (0.0, 300.0)] {
        let (sx, sy) = placed.to_sheet(lx, ly);
        assert!(sx >= x0 && sx <= x1 && sy >= y0 && sy <= y1, "({lx}, {ly})");
    }
}

#[test]
fn test_operations_outside_part_fail_validation() {
    let mut part = Part::new("Lateral", 600.0, 400.0, 18.0, "MDF-18");
    part.operations.push(hole(32.0, 37.0));
    assert!(part.validate().is_ok());

    part.operations.push(hole(650.0, 37.0));
    assert!(part.validate().is_err());
}

#[test]
fn test_holes_come_first_in_row_order_and_contour_last() {
    let mut part = Part::new("Base", 600.0, 400.0, 18.0, "MDF-18");
    part.operations = vec![
        hole(300.0, 200.0),
        Operation::Slot {
            width: 8.0,
            depth: 10.0,
            x: 0.0,
            y: 20.0,
            length: 600.0,
            orientation: nestkit_core::SlotOrientation::Horizontal,
            face: Face::Top,
            tool: None,
        },
        hole(500.0, 37.0),
        hole(100.0, 37.0),
    ];

    let ordered = part.operations_in_order();
    let origins: Vec<_> = ordered.iter().take(3).filter_map(Operation::origin).collect();
    assert_eq!(origins, vec![(100.0, 37.0), (500.0, 37.0), (300.0, 200.0)]);
    assert!(matches!(ordered[3], Operation::Slot { .. }));
    assert!(ordered[4].is_contour());
    assert_eq!(ordered.len(), 5);
}
