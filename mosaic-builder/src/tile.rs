//! DES coadd tile input
//!
//! A tile is described by a source list: one line per single-epoch chip image
//! with the image path and its magnitude zero point. Chips that live in the
//! same directory belong to the same exposure, and exposures are numbered in
//! order of first appearance.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use sky_geometry::{mean_direction, GeometryError, RaDecBounds};

use crate::error::{BuildError, Result};
use crate::hierarchy::{Cardinality, HierarchyLevel};
use crate::wcs::{chip_corners, DetectorWcs};

/// One chip image listed for the tile
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub path: PathBuf,
    pub mag_zp: f64,
    pub exp_num: usize,
}

/// Parsed tile source list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileSourceList {
    images: Vec<SourceImage>,
    exposure_dirs: Vec<PathBuf>,
}

impl TileSourceList {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let list = Self::parse(&text)?;
        info!(
            "Loaded tile source list {}: {} images from {} exposures",
            path.display(),
            list.file_count(),
            list.exposure_count()
        );
        Ok(list)
    }

    /// Parse source-list text; blank lines are skipped
    pub fn parse(text: &str) -> Result<Self> {
        let mut list = Self::default();

        for (line_num, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(raw_path) = fields.next() else {
                continue;
            };
            let mag_zp = fields
                .next()
                .ok_or_else(|| {
                    BuildError::config(format!(
                        "source list line {}: missing zero point",
                        line_num + 1
                    ))
                })?
                .parse::<f64>()
                .map_err(|e| {
                    BuildError::config(format!(
                        "source list line {}: bad zero point: {e}",
                        line_num + 1
                    ))
                })?;

            let path: PathBuf = Path::new(raw_path).components().collect();
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let exp_num = match list.exposure_dirs.iter().position(|d| *d == dir) {
                Some(n) => n,
                None => {
                    list.exposure_dirs.push(dir);
                    list.exposure_dirs.len() - 1
                }
            };

            list.images.push(SourceImage {
                path,
                mag_zp,
                exp_num,
            });
        }

        Ok(list)
    }

    pub fn file_count(&self) -> usize {
        self.images.len()
    }

    pub fn exposure_count(&self) -> usize {
        self.exposure_dirs.len()
    }

    pub fn image(&self, index: usize) -> Option<&SourceImage> {
        self.images.get(index)
    }

    pub fn file_name(&self, index: usize) -> Option<&Path> {
        self.images.get(index).map(|i| i.path.as_path())
    }

    pub fn exp_num(&self, index: usize) -> Option<usize> {
        self.images.get(index).map(|i| i.exp_num)
    }

    pub fn mag_zp(&self, index: usize) -> Option<f64> {
        self.images.get(index).map(|i| i.mag_zp)
    }

    /// Number of chip images in each exposure
    pub fn chips_per_exposure(&self) -> Vec<usize> {
        let mut counts = vec![0; self.exposure_count()];
        for image in &self.images {
            counts[image.exp_num] += 1;
        }
        counts
    }

    /// Exposure and chip levels of a tile hierarchy
    pub fn hierarchy_levels(&self) -> Vec<HierarchyLevel> {
        vec![
            HierarchyLevel::new("exposure", Cardinality::Constant(self.exposure_count())),
            HierarchyLevel::new("chip", Cardinality::PerParent(self.chips_per_exposure())),
        ]
    }

    /// Index into the list of chip `chip` of exposure `exposure`
    pub fn file_for(&self, exposure: usize, chip: usize) -> Option<usize> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, image)| image.exp_num == exposure)
            .nth(chip)
            .map(|(index, _)| index)
    }
}

/// RA/Dec box of a coadd image, RA wrapped about the coadd center
pub fn coadd_bounds(wcs: &dyn DetectorWcs) -> std::result::Result<RaDecBounds, GeometryError> {
    let corners = chip_corners(wcs)?;
    let center = mean_direction(&corners).ok_or(GeometryError::DegenerateCentroid)?;
    RaDecBounds::from_points(&corners, center.ra).ok_or(GeometryError::TooFewCorners(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Hierarchy;
    use crate::wcs::{PixelShape, TangentPlaneWcs};
    use approx::assert_relative_eq;
    use sky_geometry::{Angle, AngleExt, SkyPoint};
    use std::io::Write;

    const LIST: &str = "\
/data/red/D001/c01.fits 30.1
/data/red/D001/c02.fits 30.2

/data/red/D002/c01.fits 29.9
/data/red//D001/./c03.fits 30.0
/data/red/D003/c05.fits 31.0
";

    #[test]
    fn test_exposures_by_directory() {
        let list = TileSourceList::parse(LIST).unwrap();
        assert_eq!(list.file_count(), 5);
        assert_eq!(list.exposure_count(), 3);

        let exp_nums: Vec<usize> = (0..5).map(|i| list.exp_num(i).unwrap()).collect();
        assert_eq!(exp_nums, vec![0, 0, 1, 0, 2]);
        assert_eq!(list.chips_per_exposure(), vec![3, 1, 1]);

        assert_eq!(
            list.file_name(3).unwrap(),
            Path::new("/data/red/D001/c03.fits")
        );
        assert_relative_eq!(list.mag_zp(2).unwrap(), 29.9);
        assert_eq!(list.file_for(0, 2), Some(3));
        assert_eq!(list.file_for(2, 0), Some(4));
        assert_eq!(list.file_for(1, 1), None);
    }

    #[test]
    fn test_tile_hierarchy() {
        let list = TileSourceList::parse(LIST).unwrap();
        let hierarchy = Hierarchy::resolve(&list.hierarchy_levels(), 0).unwrap();
        assert_eq!(hierarchy.total_tasks(), 5);

        let index = hierarchy.task_index(3).unwrap();
        assert_eq!(index.indices(), &[1, 0]);
        assert_eq!(list.file_for(1, 0), Some(2));
    }

    #[test]
    fn test_bad_lines() {
        assert!(matches!(
            TileSourceList::parse("/a/b.fits\n"),
            Err(BuildError::Configuration(_))
        ));
        assert!(matches!(
            TileSourceList::parse("/a/b.fits thirty\n"),
            Err(BuildError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LIST.as_bytes()).unwrap();
        let list = TileSourceList::load(file.path()).unwrap();
        assert_eq!(list.exposure_count(), 3);

        let missing = TileSourceList::load(Path::new("/nonexistent/source_list.txt"));
        assert!(matches!(missing, Err(BuildError::Io(_))));
    }

    #[test]
    fn test_coadd_bounds_across_seam() {
        // 0.7 degree coadd centered on RA 0
        let wcs = TangentPlaneWcs::new(
            &SkyPoint::from_degrees(0.0, -45.0),
            0.25,
            Angle::from_degrees(0.0),
            (0.0, 0.0),
            PixelShape::new(10_000, 10_000),
        )
        .unwrap();
        let bounds = coadd_bounds(&wcs).unwrap();

        assert!(bounds.min_ra_degrees() < 0.0);
        assert!(bounds.max_ra_degrees() > 0.0);
        assert!(bounds.max_ra_degrees() - bounds.min_ra_degrees() < 2.0);
        assert_relative_eq!(
            bounds.max_dec_degrees() - bounds.min_dec_degrees(),
            10_000.0 * 0.25 / 3600.0,
            epsilon = 0.01
        );
    }
}
