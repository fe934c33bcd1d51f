//! Chip layout of a mosaic focal plane
//!
//! Chips are placed by the tangent-plane offset of their centers from the
//! exposure pointing, in arcseconds. Combined with a pointing this yields one
//! [`TangentPlaneWcs`] per chip.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sky_geometry::{Angle, AngleExt, GeometryError, SkyPoint};

use crate::error::BuildError;
use crate::hierarchy::{Hierarchy, TaskIndex};
use crate::wcs::{DetectorWcs, PixelShape, TangentPlaneWcs, WcsService};

/// Position of a chip center on the tangent plane
///
/// # Coordinate System
/// - Origin (0, 0) is the exposure pointing
/// - X increases toward increasing RA
/// - Y increases toward north
/// - Offsets are in arcseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChipPosition {
    pub x_arcsec: f64,
    pub y_arcsec: f64,
}

/// A single chip with its position in the array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedChip {
    pub shape: PixelShape,
    pub position: ChipPosition,
    /// Rotation of the chip x axis from +X, counter-clockwise
    #[serde(default)]
    pub rotation_deg: f64,
}

/// Array of chips sharing one pixel scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipArray {
    pub pixel_scale_arcsec: f64,
    pub chips: Vec<PositionedChip>,
}

impl ChipArray {
    pub fn new(pixel_scale_arcsec: f64, chips: Vec<PositionedChip>) -> Self {
        Self {
            pixel_scale_arcsec,
            chips,
        }
    }

    /// A single chip centered on the pointing
    pub fn single(pixel_scale_arcsec: f64, shape: PixelShape) -> Self {
        Self::grid(pixel_scale_arcsec, shape, 1, 1, 0.0)
    }

    /// `nx` by `ny` identical chips separated by `gap_arcsec`, centered on the pointing
    ///
    /// Chips are ordered row by row from the south-west corner.
    pub fn grid(
        pixel_scale_arcsec: f64,
        shape: PixelShape,
        nx: usize,
        ny: usize,
        gap_arcsec: f64,
    ) -> Self {
        let pitch_x = shape.width as f64 * pixel_scale_arcsec + gap_arcsec;
        let pitch_y = shape.height as f64 * pixel_scale_arcsec + gap_arcsec;
        let x0 = -(nx as f64 - 1.0) / 2.0 * pitch_x;
        let y0 = -(ny as f64 - 1.0) / 2.0 * pitch_y;

        let chips = (0..ny)
            .flat_map(|j| (0..nx).map(move |i| (i, j)))
            .map(|(i, j)| PositionedChip {
                shape,
                position: ChipPosition {
                    x_arcsec: x0 + i as f64 * pitch_x,
                    y_arcsec: y0 + j as f64 * pitch_y,
                },
                rotation_deg: 0.0,
            })
            .collect();

        Self::new(pixel_scale_arcsec, chips)
    }

    pub fn chip_count(&self) -> usize {
        self.chips.len()
    }

    /// WCS of chip `index` for an exposure at `pointing`
    pub fn wcs_for(&self, pointing: &SkyPoint, index: usize) -> Result<TangentPlaneWcs, GeometryError> {
        let chip = self.chips.get(index).ok_or_else(|| {
            GeometryError::Transform(format!(
                "chip {index} does not exist in a {}-chip array",
                self.chips.len()
            ))
        })?;
        TangentPlaneWcs::new(
            pointing,
            self.pixel_scale_arcsec,
            Angle::from_degrees(chip.rotation_deg),
            (chip.position.x_arcsec, chip.position.y_arcsec),
            chip.shape,
        )
    }
}

/// WCS service for a run of exposures observed with one chip array
///
/// The exposure is the node at `exposure_level` and the chip is the index at
/// the innermost level.
#[derive(Debug, Clone)]
pub struct FocalPlaneService {
    array: ChipArray,
    pointings: Vec<SkyPoint>,
    exposure_level: usize,
}

impl FocalPlaneService {
    pub fn new(array: ChipArray, pointings: Vec<SkyPoint>, exposure_level: usize) -> Self {
        Self {
            array,
            pointings,
            exposure_level,
        }
    }

    pub fn array(&self) -> &ChipArray {
        &self.array
    }

    pub fn pointings(&self) -> &[SkyPoint] {
        &self.pointings
    }

    /// Level whose index selects the chip, None when exposures are the leaves
    fn chip_level(&self, depth: usize) -> Option<usize> {
        (depth > self.exposure_level + 1).then(|| depth - 1)
    }

    /// Check that every exposure has a pointing and every chip exists in the array
    ///
    /// # Errors
    /// * `Configuration` - the exposure level is outside the hierarchy, pointings
    ///   are missing, or a parent has more chips than the array holds
    pub fn validate(&self, hierarchy: &Hierarchy) -> crate::error::Result<()> {
        let depth = hierarchy.depth();
        if self.exposure_level >= depth {
            return Err(BuildError::config(format!(
                "exposure level {} is outside a {}-level hierarchy",
                self.exposure_level, depth
            )));
        }

        let exposures = hierarchy.node_count(self.exposure_level);
        if self.pointings.len() < exposures {
            return Err(BuildError::config(format!(
                "{} pointings given for {} exposures",
                self.pointings.len(),
                exposures
            )));
        }

        let chips = self
            .chip_level(depth)
            .map_or(1, |level| hierarchy.counts(level).iter().copied().max().unwrap_or(0));
        if chips > self.array.chip_count() {
            return Err(BuildError::config(format!(
                "hierarchy has up to {} chips per exposure but the array holds {}",
                chips,
                self.array.chip_count()
            )));
        }
        Ok(())
    }
}

impl WcsService for FocalPlaneService {
    fn detector(&self, index: &TaskIndex) -> Result<Arc<dyn DetectorWcs>, GeometryError> {
        let exposure = index.node_at(self.exposure_level).ok_or_else(|| {
            GeometryError::Transform(format!(
                "task {} has no level {}",
                index.task(),
                self.exposure_level
            ))
        })?;
        let pointing = self.pointings.get(exposure).ok_or_else(|| {
            GeometryError::Transform(format!("no pointing for exposure {exposure}"))
        })?;
        let chip = self
            .chip_level(index.depth())
            .and_then(|level| index.index_at(level))
            .unwrap_or(0);
        Ok(Arc::new(self.array.wcs_for(pointing, chip)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wcs::chip_center;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_chip_array() {
        let array = ChipArray::single(0.5, PixelShape::new(200, 100));
        assert_eq!(array.chip_count(), 1);
        assert_eq!(array.chips[0].shape.pixel_count(), 20_000);
        assert_relative_eq!(array.chips[0].position.x_arcsec, 0.0);
        assert_relative_eq!(array.chips[0].position.y_arcsec, 0.0);
    }

    #[test]
    fn test_grid_layout() {
        let array = ChipArray::grid(1.0, PixelShape::new(100, 100), 2, 2, 10.0);
        assert_eq!(array.chip_count(), 4);

        // Row by row from the south-west
        assert_relative_eq!(array.chips[0].position.x_arcsec, -55.0);
        assert_relative_eq!(array.chips[0].position.y_arcsec, -55.0);
        assert_relative_eq!(array.chips[1].position.x_arcsec, 55.0);
        assert_relative_eq!(array.chips[2].position.y_arcsec, 55.0);
    }

    #[test]
    fn test_chip_wcs_offsets() {
        let array = ChipArray::grid(1.0, PixelShape::new(100, 100), 2, 1, 0.0);
        let pointing = SkyPoint::from_degrees(10.0, 0.0);

        let east = array.wcs_for(&pointing, 1).unwrap();
        let center = chip_center(&east).unwrap();
        assert_relative_eq!(
            center.ra_degrees(),
            10.0 + 50.0 / 3600.0,
            epsilon = 1e-9
        );
        assert!(array.wcs_for(&pointing, 2).is_err());
    }

    #[test]
    fn test_service_maps_task_to_chip() {
        use crate::hierarchy::{Cardinality, Hierarchy, HierarchyLevel};

        let hierarchy = Hierarchy::resolve(
            &[
                HierarchyLevel::new("exposure", Cardinality::Constant(2)),
                HierarchyLevel::new("chip", Cardinality::Constant(2)),
            ],
            0,
        )
        .unwrap();
        let array = ChipArray::grid(1.0, PixelShape::new(100, 100), 2, 1, 0.0);
        let service = FocalPlaneService::new(
            array,
            vec![
                SkyPoint::from_degrees(10.0, 0.0),
                SkyPoint::from_degrees(20.0, 0.0),
            ],
            0,
        );

        let wcs = service.detector(&hierarchy.task_index(2).unwrap()).unwrap();
        let center = chip_center(wcs.as_ref()).unwrap();
        assert_relative_eq!(
            center.ra_degrees(),
            20.0 - 50.0 / 3600.0,
            epsilon = 1e-9
        );

        let short = FocalPlaneService::new(
            ChipArray::single(1.0, PixelShape::new(10, 10)),
            vec![SkyPoint::from_degrees(0.0, 0.0)],
            0,
        );
        assert!(short.detector(&hierarchy.task_index(3).unwrap()).is_err());
    }

    #[test]
    fn test_validate_against_hierarchy() {
        use crate::hierarchy::{Cardinality, Hierarchy, HierarchyLevel};

        let hierarchy = |exposures, chips| {
            Hierarchy::resolve(
                &[
                    HierarchyLevel::new("exposure", Cardinality::Constant(exposures)),
                    HierarchyLevel::new("chip", chips),
                ],
                0,
            )
            .unwrap()
        };
        let service = FocalPlaneService::new(
            ChipArray::grid(1.0, PixelShape::new(100, 100), 2, 2, 0.0),
            vec![
                SkyPoint::from_degrees(10.0, 0.0),
                SkyPoint::from_degrees(20.0, 0.0),
            ],
            0,
        );

        assert!(service
            .validate(&hierarchy(2, Cardinality::PerParent(vec![4, 3])))
            .is_ok());
        assert!(matches!(
            service.validate(&hierarchy(3, Cardinality::Constant(4))),
            Err(BuildError::Configuration(_))
        ));
        assert!(matches!(
            service.validate(&hierarchy(2, Cardinality::PerParent(vec![4, 5]))),
            Err(BuildError::Configuration(_))
        ));

        let outside =
            FocalPlaneService::new(ChipArray::single(1.0, PixelShape::new(10, 10)), vec![], 2);
        assert!(matches!(
            outside.validate(&hierarchy(1, Cardinality::Constant(1))),
            Err(BuildError::Configuration(_))
        ));
    }

    #[test]
    fn test_exposure_leaves_use_first_chip() {
        use crate::hierarchy::{Cardinality, Hierarchy, HierarchyLevel};

        let hierarchy = Hierarchy::resolve(
            &[HierarchyLevel::new("exposure", Cardinality::Constant(3))],
            0,
        )
        .unwrap();
        let service = FocalPlaneService::new(
            ChipArray::single(1.0, PixelShape::new(100, 100)),
            (0..3).map(|i| SkyPoint::from_degrees(10.0 * i as f64, 0.0)).collect(),
            0,
        );
        assert!(service.validate(&hierarchy).is_ok());

        let wcs = service.detector(&hierarchy.task_index(2).unwrap()).unwrap();
        let center = chip_center(wcs.as_ref()).unwrap();
        assert_relative_eq!(center.ra_degrees(), 20.0, epsilon = 1e-9);
    }
}
