//! World-coordinate services consumed by the planner
//!
//! The host owns the real WCS implementations. This module defines the narrow
//! interface the planner needs from them (pixel -> sky for chip corners, sky ->
//! pixel for off-chip tests) and a gnomonic stand-in used by the command-line
//! driver and the tests.

use std::fmt;
use std::sync::Arc;

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use sky_geometry::{Angle, AngleExt, GeometryError, GnomonicProjector, SkyPoint};

use crate::hierarchy::TaskIndex;

/// Detector dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelShape {
    pub width: usize,
    pub height: usize,
}

impl PixelShape {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Geometric center as (x, y)
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Corner pixel positions in footprint order: (0,0), (0,h), (w,0), (w,h)
    pub fn corners(&self) -> [(f64, f64); 4] {
        let (w, h) = (self.width as f64, self.height as f64);
        [(0.0, 0.0), (0.0, h), (w, 0.0), (w, h)]
    }

    pub fn bounds(&self) -> PixelBounds {
        PixelBounds {
            xmin: 0.0,
            xmax: self.width as f64,
            ymin: 0.0,
            ymax: self.height as f64,
        }
    }
}

/// Rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl PixelBounds {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Copy grown by `border` pixels on every side
    pub fn with_border(&self, border: f64) -> Self {
        Self {
            xmin: self.xmin - border,
            xmax: self.xmax + border,
            ymin: self.ymin - border,
            ymax: self.ymax + border,
        }
    }

    /// True if `(x, y)` is farther than `min_dist` pixels outside the bounds
    ///
    /// `min_dist` is rounded up to a whole number of pixels first.
    pub fn is_off_chip(&self, x: f64, y: f64, min_dist: f64) -> bool {
        !self.with_border(min_dist.ceil()).contains(x, y)
    }
}

/// A world position as reported by a WCS
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldPosition {
    Celestial(SkyPoint),
    /// Euclidean world coordinates from a non-celestial WCS
    Flat { x: f64, y: f64 },
}

impl WorldPosition {
    /// The sky position, or `NonCelestial` for flat coordinates
    pub fn celestial(self) -> Result<SkyPoint, GeometryError> {
        match self {
            WorldPosition::Celestial(point) => Ok(point),
            WorldPosition::Flat { .. } => Err(GeometryError::NonCelestial),
        }
    }
}

/// Coordinate transform of one detector
pub trait DetectorWcs: Send + Sync + fmt::Debug {
    fn shape(&self) -> PixelShape;

    /// World position of a pixel position
    fn world_position(&self, x: f64, y: f64) -> Result<WorldPosition, GeometryError>;

    /// Pixel position of a sky position, None if it has no image on this detector's plane
    fn pixel_position(&self, point: &SkyPoint) -> Option<(f64, f64)>;
}

/// Sky positions of a detector's four corners, in footprint order
pub fn chip_corners(wcs: &dyn DetectorWcs) -> Result<[SkyPoint; 4], GeometryError> {
    let [a, b, c, d] = wcs.shape().corners();
    Ok([
        wcs.world_position(a.0, a.1)?.celestial()?,
        wcs.world_position(b.0, b.1)?.celestial()?,
        wcs.world_position(c.0, c.1)?.celestial()?,
        wcs.world_position(d.0, d.1)?.celestial()?,
    ])
}

/// Sky position of a detector's center pixel
pub fn chip_center(wcs: &dyn DetectorWcs) -> Result<SkyPoint, GeometryError> {
    let (x, y) = wcs.shape().center();
    wcs.world_position(x, y)?.celestial()
}

/// Host service that supplies the WCS of the detector a task renders
pub trait WcsService: Send + Sync {
    fn detector(&self, index: &TaskIndex) -> Result<Arc<dyn DetectorWcs>, GeometryError>;
}

/// Gnomonic WCS for one chip of a focal plane
///
/// Pixel `(x, y)` maps linearly to tangent-plane offsets (arcsec) about the
/// exposure pointing:
///
/// `(u, v) = offset + CD * (x - cx, y - cy)`
///
/// where `(cx, cy)` is the chip center and `CD` holds the pixel scale,
/// rotation and optional parity flip.
#[derive(Debug, Clone)]
pub struct TangentPlaneWcs {
    projector: GnomonicProjector,
    cd: Matrix2<f64>,
    cd_inverse: Matrix2<f64>,
    offset: Vector2<f64>,
    shape: PixelShape,
}

impl TangentPlaneWcs {
    /// # Arguments
    /// * `pointing` - Tangent point of the exposure
    /// * `pixel_scale_arcsec` - Arcseconds per pixel, must be positive
    /// * `rotation` - Angle from +u to the chip x axis, counter-clockwise
    /// * `offset_arcsec` - Chip center on the tangent plane
    /// * `shape` - Chip size in pixels
    pub fn new(
        pointing: &SkyPoint,
        pixel_scale_arcsec: f64,
        rotation: Angle,
        offset_arcsec: (f64, f64),
        shape: PixelShape,
    ) -> Result<Self, GeometryError> {
        if !(pixel_scale_arcsec.is_finite() && pixel_scale_arcsec > 0.0) {
            return Err(GeometryError::Transform(format!(
                "pixel scale must be positive, got {pixel_scale_arcsec}"
            )));
        }
        let (s, c) = rotation.as_radians().sin_cos();
        let cd = Matrix2::new(c, -s, s, c) * pixel_scale_arcsec;
        Self::from_cd(pointing, cd, offset_arcsec, shape)
    }

    fn from_cd(
        pointing: &SkyPoint,
        cd: Matrix2<f64>,
        offset_arcsec: (f64, f64),
        shape: PixelShape,
    ) -> Result<Self, GeometryError> {
        let cd_inverse = cd
            .try_inverse()
            .ok_or_else(|| GeometryError::Transform("singular CD matrix".to_string()))?;
        Ok(Self {
            projector: GnomonicProjector::new(pointing),
            cd,
            cd_inverse,
            offset: Vector2::new(offset_arcsec.0, offset_arcsec.1),
            shape,
        })
    }

    /// Same chip with its x axis mirrored
    pub fn with_parity_flip(&self) -> Self {
        let flip = Matrix2::new(-1.0, 0.0, 0.0, 1.0);
        let cd = self.cd * flip;
        Self {
            projector: self.projector.clone(),
            cd,
            cd_inverse: flip * self.cd_inverse,
            offset: self.offset,
            shape: self.shape,
        }
    }

    pub fn pointing(&self) -> SkyPoint {
        self.projector.center
    }

    /// Tangent-plane offset (arcsec) of a pixel position
    pub fn tangent_position(&self, x: f64, y: f64) -> (f64, f64) {
        let (cx, cy) = self.shape.center();
        let uv = self.offset + self.cd * Vector2::new(x - cx, y - cy);
        (uv.x, uv.y)
    }
}

impl DetectorWcs for TangentPlaneWcs {
    fn shape(&self) -> PixelShape {
        self.shape
    }

    fn world_position(&self, x: f64, y: f64) -> Result<WorldPosition, GeometryError> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(GeometryError::Transform(format!(
                "non-finite pixel position ({x}, {y})"
            )));
        }
        let (u, v) = self.tangent_position(x, y);
        Ok(WorldPosition::Celestial(
            self.projector.deproject_arcsec(u, v),
        ))
    }

    fn pixel_position(&self, point: &SkyPoint) -> Option<(f64, f64)> {
        let (u, v) = self.projector.project_arcsec(point)?;
        let (cx, cy) = self.shape.center();
        let xy = self.cd_inverse * (Vector2::new(u, v) - self.offset);
        Some((xy.x + cx, xy.y + cy))
    }
}

/// Linear WCS with Euclidean world coordinates
///
/// Stands in for hosts configured with a flat WCS; footprint geometry must
/// reject it.
#[derive(Debug, Clone)]
pub struct FlatWcs {
    pub scale: f64,
    pub shape: PixelShape,
}

impl DetectorWcs for FlatWcs {
    fn shape(&self) -> PixelShape {
        self.shape
    }

    fn world_position(&self, x: f64, y: f64) -> Result<WorldPosition, GeometryError> {
        Ok(WorldPosition::Flat {
            x: x * self.scale,
            y: y * self.scale,
        })
    }

    fn pixel_position(&self, _point: &SkyPoint) -> Option<(f64, f64)> {
        None
    }
}
