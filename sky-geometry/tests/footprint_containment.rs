//! Footprint and containment working together on a small synthetic exposure

use approx::assert_relative_eq;
use sky_geometry::{
    Angle, AngleExt, Containment, Footprint, GnomonicProjector, SkyPoint, SkyPointRandomizer,
    SkyQuad,
};

/// Four chips laid out 2x2 on the tangent plane around a pointing, each 600" on a side
fn chip_corners(pointing: &SkyPoint) -> Vec<[SkyPoint; 4]> {
    let projector = GnomonicProjector::new(pointing);
    let half = 600.0;
    let gap = 20.0;
    let mut chips = Vec::new();
    for (cx, cy) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
        let x0 = cx * (half / 2.0 + gap);
        let y0 = cy * (half / 2.0 + gap);
        let h = half / 2.0;
        chips.push([
            projector.deproject_arcsec(x0 - h, y0 - h),
            projector.deproject_arcsec(x0 - h, y0 + h),
            projector.deproject_arcsec(x0 + h, y0 + h),
            projector.deproject_arcsec(x0 + h, y0 - h),
        ]);
    }
    chips
}

#[test]
fn test_exposure_footprint_recovers_pointing() {
    let pointing = SkyPoint::from_degrees(52.0, -28.0);
    let corners: Vec<SkyPoint> = chip_corners(&pointing).into_iter().flatten().collect();

    let footprint = Footprint::from_corners(&corners).unwrap();

    assert_relative_eq!(
        footprint.pointing().angular_distance(&pointing).as_arcseconds(),
        0.0,
        epsilon = 1e-3
    );

    // Chips span +-620" around the pointing
    let tangent = footprint.bounds_tangent();
    assert_relative_eq!(tangent.xmin, -620.0, epsilon = 1e-3);
    assert_relative_eq!(tangent.xmax, 620.0, epsilon = 1e-3);
    assert_relative_eq!(tangent.ymin, -620.0, epsilon = 1e-3);
    assert_relative_eq!(tangent.ymax, 620.0, epsilon = 1e-3);
    assert_relative_eq!(
        footprint.max_radius().as_arcseconds(),
        620.0 * 2.0_f64.sqrt(),
        epsilon = 1e-3
    );
}

#[test]
fn test_prune_objects_against_each_chip() {
    let pointing = SkyPoint::from_degrees(52.0, -28.0);
    let chips = chip_corners(&pointing);
    let projector = GnomonicProjector::new(&pointing);

    let mut randomizer = SkyPointRandomizer::new(7);
    let positions: Vec<SkyPoint> = (0..500)
        .map(|_| {
            randomizer.generate_within(
                51.6_f64.to_radians(),
                52.4_f64.to_radians(),
                (-28.4_f64).to_radians(),
                (-27.6_f64).to_radians(),
            )
        })
        .collect();

    let quads: Vec<SkyQuad> = chips
        .iter()
        .map(|c| SkyQuad::from_corners(*c, Angle::from_arcseconds(0.0)))
        .collect();

    for position in &positions {
        let (u, v) = projector.project_arcsec(position).unwrap();
        let on_any_chip = quads.iter().any(|q| q.contains(position).is_inside());

        // Chips cover |u|,|v| in [20, 620]; stay clear of the edges to avoid rounding noise
        let inside_clearly = (25.0..615.0).contains(&u.abs()) && (25.0..615.0).contains(&v.abs());
        let outside_clearly = u.abs() > 625.0 || v.abs() > 625.0 || u.abs() < 15.0 || v.abs() < 15.0;

        if inside_clearly {
            assert!(on_any_chip, "({u:.1}, {v:.1}) should land on a chip");
        }
        if outside_clearly {
            assert!(!on_any_chip, "({u:.1}, {v:.1}) should miss every chip");
        }
    }
}

#[test]
fn test_border_recovers_gap_objects() {
    let pointing = SkyPoint::from_degrees(200.0, 45.0);
    let chips = chip_corners(&pointing);
    let projector = GnomonicProjector::new(&pointing);

    // Inside the 40" gap between the left two chips, 20" from each
    let gap_point = projector.deproject_arcsec(-320.0, 0.0);

    let tight: Vec<Containment> = chips
        .iter()
        .map(|c| SkyQuad::from_corners(*c, Angle::from_arcseconds(0.0)).contains(&gap_point))
        .collect();
    assert!(tight.iter().all(|c| !c.keep()));

    let bordered = SkyQuad::from_corners(chips[0], Angle::from_arcseconds(60.0));
    assert!(bordered.contains(&gap_point).is_inside());
}
