//! Geometry shared by every task of a top-level group
//!
//! For one exposure (or tile) this collects the WCS and corner coordinates of
//! every chip, derives the group footprint, and publishes the result as named
//! scalars the host can use in expressions and truth catalogs.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use sky_geometry::{Angle, AngleExt, Footprint, GeometryError, SkyPoint, SkyQuad};

use crate::hierarchy::TaskIndex;
use crate::meta::MetaValues;
use crate::wcs::{chip_center, chip_corners, DetectorWcs, WcsService};

/// One chip of a group: its WCS and its border-expanded sky outline
#[derive(Debug, Clone)]
pub struct ChipGeometry {
    pub wcs: Arc<dyn DetectorWcs>,
    /// Corners in footprint order: (0,0), (0,h), (w,0), (w,h)
    pub corners: [SkyPoint; 4],
    pub quad: SkyQuad,
}

impl ChipGeometry {
    /// # Arguments
    /// * `wcs` - Detector transform from the host
    /// * `border` - Margin added around the chip outline for containment tests
    pub fn new(wcs: Arc<dyn DetectorWcs>, border: Angle) -> Result<Self, GeometryError> {
        let corners = chip_corners(wcs.as_ref())?;
        let center = chip_center(wcs.as_ref())?;
        // Perimeter order: lower-left, upper-left, upper-right, lower-right
        let perimeter = [corners[0], corners[1], corners[3], corners[2]];
        let quad = SkyQuad::with_center(perimeter, center, border);
        Ok(Self { wcs, corners, quad })
    }

    /// True if `point` falls more than `min_dist` pixels outside the chip
    ///
    /// Positions with no pixel image (behind the tangent plane) are off-chip.
    pub fn is_off_chip(&self, point: &SkyPoint, min_dist: f64) -> bool {
        match self.wcs.pixel_position(point) {
            Some((x, y)) => self.wcs.shape().bounds().is_off_chip(x, y, min_dist),
            None => true,
        }
    }
}

/// Geometry and per-group values computed once for a top-level group
#[derive(Debug, Clone)]
pub struct GroupGeometry {
    group: usize,
    first_task: usize,
    top_level_seed: u64,
    chips: Vec<ChipGeometry>,
    footprint: Option<Footprint>,
    meta: MetaValues,
}

impl GroupGeometry {
    /// Compute the geometry of one group
    ///
    /// # Arguments
    /// * `group` - Top-level index of the group
    /// * `tasks` - Every task of the group, in flat order
    /// * `wcs` - Host WCS service; without one the group has no footprint
    /// * `border` - Containment margin for each chip
    /// * `meta` - The group's evaluated meta parameters
    /// * `top_level_seed` - The group's top-level seed
    pub fn compute(
        group: usize,
        tasks: &[TaskIndex],
        wcs: Option<&dyn WcsService>,
        border: Angle,
        meta: MetaValues,
        top_level_seed: u64,
    ) -> Result<Self, GeometryError> {
        let first_task = tasks.first().map_or(0, TaskIndex::task);

        let (chips, footprint) = match wcs {
            Some(service) => {
                let chips = tasks
                    .iter()
                    .map(|index| ChipGeometry::new(service.detector(index)?, border))
                    .collect::<Result<Vec<_>, _>>()?;
                let corners: Vec<SkyPoint> = chips.iter().flat_map(|c| c.corners).collect();
                let footprint = Footprint::from_corners(&corners)?;
                info!(
                    "Group {}: {} chips, pointing {}, max radius {:.1} arcmin",
                    group,
                    chips.len(),
                    footprint.pointing(),
                    footprint.max_radius().as_degrees() * 60.0
                );
                (chips, Some(footprint))
            }
            None => (Vec::new(), None),
        };

        let geometry = Self {
            group,
            first_task,
            top_level_seed,
            chips,
            footprint,
            meta,
        };

        if log::log_enabled!(log::Level::Debug) {
            for (name, value) in geometry.scalars() {
                debug!("Group {} {} = {}", group, name, value);
            }
        }

        Ok(geometry)
    }

    pub fn group(&self) -> usize {
        self.group
    }

    /// Flat number of the group's first task
    pub fn first_task(&self) -> usize {
        self.first_task
    }

    pub fn top_level_seed(&self) -> u64 {
        self.top_level_seed
    }

    pub fn footprint(&self) -> Option<&Footprint> {
        self.footprint.as_ref()
    }

    pub fn meta(&self) -> &MetaValues {
        &self.meta
    }

    pub fn chips(&self) -> &[ChipGeometry] {
        &self.chips
    }

    /// Chip rendered by flat task `task`, if the group has geometry
    pub fn chip_for_task(&self, task: usize) -> Option<&ChipGeometry> {
        task.checked_sub(self.first_task)
            .and_then(|offset| self.chips.get(offset))
    }

    /// Named scalars for the host
    ///
    /// Angles on the sky are in degrees and tangent-plane values in arcseconds.
    /// `focal_xmin`/`focal_xmax` follow the east-right tangent frame of
    /// [`sky_geometry::projection`]; GalSim-convention hosts negate and swap them.
    /// Footprint values are absent when the group has no WCS.
    pub fn scalars(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        out.insert("exp_num".to_string(), self.group as f64);
        out.insert("first_task_num".to_string(), self.first_task as f64);

        if let Some(footprint) = &self.footprint {
            let pointing = footprint.pointing();
            let radec = footprint.bounds_radec();
            let tangent = footprint.bounds_tangent();
            for (name, value) in [
                ("world_center_ra", pointing.ra_degrees()),
                ("world_center_dec", pointing.dec_degrees()),
                ("fov_minra", radec.min_ra_degrees()),
                ("fov_maxra", radec.max_ra_degrees()),
                ("fov_mindec", radec.min_dec_degrees()),
                ("fov_maxdec", radec.max_dec_degrees()),
                ("focal_xmin", tangent.xmin),
                ("focal_xmax", tangent.xmax),
                ("focal_ymin", tangent.ymin),
                ("focal_ymax", tangent.ymax),
                ("focal_rmax", footprint.max_radius().as_arcseconds()),
            ] {
                out.insert(name.to_string(), value);
            }
        }

        for (name, value) in self.meta.iter() {
            out.insert(name.to_string(), value);
        }
        out
    }

    /// Tangent-plane radius (arcsec) of a sky position from the group pointing
    pub fn focal_radius(&self, point: &SkyPoint) -> Option<f64> {
        self.footprint
            .as_ref()?
            .focal_radius(point)
            .map(|r| r.as_arcseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip_array::{ChipArray, FocalPlaneService};
    use crate::hierarchy::{Cardinality, Hierarchy, HierarchyLevel};
    use crate::meta::MetaParam;
    use crate::wcs::{FlatWcs, PixelShape};
    use approx::assert_relative_eq;

    fn exposure_tasks(chips: usize) -> Vec<TaskIndex> {
        let hierarchy = Hierarchy::resolve(
            &[
                HierarchyLevel::new("exposure", Cardinality::Constant(1)),
                HierarchyLevel::new("chip", Cardinality::Constant(chips)),
            ],
            0,
        )
        .unwrap();
        (0..chips)
            .map(|n| hierarchy.task_index(n).unwrap())
            .collect()
    }

    #[test]
    fn test_group_scalars_from_chip_grid() {
        let array = ChipArray::grid(1.0, PixelShape::new(600, 600), 2, 2, 40.0);
        let service = FocalPlaneService::new(array, vec![SkyPoint::from_degrees(52.0, -28.0)], 0);
        let meta = MetaValues::draw(&[MetaParam::new("psf_fwhm", 0.8, 1.2)], 7);

        let geometry = GroupGeometry::compute(
            0,
            &exposure_tasks(4),
            Some(&service),
            Angle::from_arcseconds(60.0),
            meta,
            7,
        )
        .unwrap();

        let scalars = geometry.scalars();
        assert_relative_eq!(scalars["world_center_ra"], 52.0, epsilon = 1e-9);
        assert_relative_eq!(scalars["world_center_dec"], -28.0, epsilon = 1e-9);
        assert_relative_eq!(scalars["focal_xmin"], -620.0, epsilon = 1e-6);
        assert_relative_eq!(scalars["focal_ymax"], 620.0, epsilon = 1e-6);
        assert_relative_eq!(scalars["focal_rmax"], 620.0 * 2.0_f64.sqrt(), epsilon = 1e-6);
        assert!(scalars["fov_minra"] < 52.0 && scalars["fov_maxra"] > 52.0);
        assert_eq!(scalars["exp_num"], 0.0);
        assert_eq!(scalars["first_task_num"], 0.0);
        assert!((0.8..1.2).contains(&scalars["psf_fwhm"]));

        assert_eq!(geometry.chips().len(), 4);
        assert!(geometry.chip_for_task(3).is_some());
        assert!(geometry.chip_for_task(4).is_none());
    }

    #[test]
    fn test_chip_quad_and_off_chip() {
        let array = ChipArray::single(0.25, PixelShape::new(400, 400));
        let pointing = SkyPoint::from_degrees(120.0, 10.0);
        let wcs: Arc<dyn DetectorWcs> = Arc::new(array.wcs_for(&pointing, 0).unwrap());
        let chip = ChipGeometry::new(wcs, Angle::from_arcseconds(10.0)).unwrap();

        assert!(chip.quad.is_well_formed());
        assert!(chip.quad.contains(&pointing).is_inside());
        assert!(!chip.is_off_chip(&pointing, 0.0));

        // 55" east of center: chip half-width is 50", so 20 px outside
        let projector = sky_geometry::GnomonicProjector::new(&pointing);
        let outside = projector.deproject_arcsec(55.0, 0.0);
        assert!(chip.is_off_chip(&outside, 10.0));
        assert!(!chip.is_off_chip(&outside, 20.0));
        // Still inside the 10" containment border
        assert!(chip.quad.contains(&outside).is_inside());
    }

    #[test]
    fn test_group_without_wcs_has_only_counters() {
        let geometry = GroupGeometry::compute(
            3,
            &exposure_tasks(2),
            None,
            Angle::from_arcseconds(60.0),
            MetaValues::default(),
            0,
        )
        .unwrap();
        let scalars = geometry.scalars();
        assert_eq!(scalars.len(), 2);
        assert!(geometry.footprint().is_none());
        assert!(geometry.chip_for_task(0).is_none());
    }

    struct FlatService;

    impl WcsService for FlatService {
        fn detector(&self, _index: &TaskIndex) -> Result<Arc<dyn DetectorWcs>, GeometryError> {
            Ok(Arc::new(FlatWcs {
                scale: 1.0,
                shape: PixelShape::new(10, 10),
            }))
        }
    }

    #[test]
    fn test_flat_wcs_rejected() {
        let result = GroupGeometry::compute(
            0,
            &exposure_tasks(1),
            Some(&FlatService),
            Angle::from_arcseconds(60.0),
            MetaValues::default(),
            0,
        );
        assert_eq!(result.unwrap_err(), GeometryError::NonCelestial);
    }
}
