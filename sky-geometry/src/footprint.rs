//! Footprint of a group of detectors on the sky
//!
//! Given the world coordinates of every chip corner in one exposure (or tile),
//! computes the pointing, an RA/Dec box, the rectangle covered on the tangent
//! plane at the pointing, and the largest radius from the pointing.

use log::debug;

use crate::bounds::{RaDecBounds, TangentBounds};
use crate::error::GeometryError;
use crate::projection::GnomonicProjector;
use crate::sky_point::{mean_direction, SkyPoint};
use crate::units::{Angle, AngleExt};

/// Derived geometry of a set of sky corners
#[derive(Debug, Clone)]
pub struct Footprint {
    corners: Vec<SkyPoint>,
    pointing: SkyPoint,
    bounds_radec: RaDecBounds,
    bounds_tangent: TangentBounds,
    max_radius: Angle,
    projector: GnomonicProjector,
}

impl Footprint {
    /// Build a footprint from its corner coordinates
    ///
    /// The pointing is the renormalized Euclidean mean of the corner unit
    /// vectors. Every corner is then projected gnomonically about the pointing
    /// to get the tangent-plane rectangle (arcsec) and maximum radius.
    ///
    /// # Errors
    /// * `TooFewCorners` - fewer than 3 corners
    /// * `NonFinite` - a corner has NaN or infinite coordinates
    /// * `DegenerateCentroid` - corner vectors sum to (nearly) zero
    /// * `BehindTangentPlane` - a corner is a quarter turn or more from the pointing
    pub fn from_corners(corners: &[SkyPoint]) -> Result<Self, GeometryError> {
        if corners.len() < 3 {
            return Err(GeometryError::TooFewCorners(corners.len()));
        }
        if let Some(index) = corners.iter().position(|c| !c.is_finite()) {
            return Err(GeometryError::NonFinite(index));
        }

        let pointing = mean_direction(corners).ok_or(GeometryError::DegenerateCentroid)?;
        let projector = GnomonicProjector::new(&pointing);

        let bounds_radec = RaDecBounds::from_points(corners, pointing.ra)
            .ok_or(GeometryError::TooFewCorners(0))?;

        let mut bounds_tangent = TangentBounds::empty();
        let mut max_radius_sq: f64 = 0.0;
        for (index, corner) in corners.iter().enumerate() {
            let (u, v) = projector
                .project_arcsec(corner)
                .ok_or(GeometryError::BehindTangentPlane(index))?;
            bounds_tangent.include(u, v);
            max_radius_sq = max_radius_sq.max(u * u + v * v);
        }

        let footprint = Self {
            corners: corners.to_vec(),
            pointing,
            bounds_radec,
            bounds_tangent,
            max_radius: Angle::from_arcseconds(max_radius_sq.sqrt()),
            projector,
        };

        debug!("Calculated footprint center to be {}", footprint.pointing);
        debug!(
            "RA range = {:.4} - {:.4} deg, Dec range = {:.4} - {:.4} deg",
            footprint.bounds_radec.min_ra_degrees(),
            footprint.bounds_radec.max_ra_degrees(),
            footprint.bounds_radec.min_dec_degrees(),
            footprint.bounds_radec.max_dec_degrees()
        );
        debug!(
            "Tangent-plane bounds = x[{:.1}, {:.1}] y[{:.1}, {:.1}] arcsec, max radius = {:.0} arcsec",
            footprint.bounds_tangent.xmin,
            footprint.bounds_tangent.xmax,
            footprint.bounds_tangent.ymin,
            footprint.bounds_tangent.ymax,
            footprint.max_radius.as_arcseconds()
        );

        Ok(footprint)
    }

    /// Centroid direction of the corners
    pub fn pointing(&self) -> SkyPoint {
        self.pointing
    }

    /// RA/Dec box, RA wrapped about the pointing
    pub fn bounds_radec(&self) -> &RaDecBounds {
        &self.bounds_radec
    }

    /// Rectangle on the tangent plane at the pointing (arcsec)
    pub fn bounds_tangent(&self) -> &TangentBounds {
        &self.bounds_tangent
    }

    /// Largest tangent-plane distance from the pointing to any corner
    pub fn max_radius(&self) -> Angle {
        self.max_radius
    }

    pub fn corners(&self) -> &[SkyPoint] {
        &self.corners
    }

    /// Projector tangent at the pointing
    pub fn projector(&self) -> &GnomonicProjector {
        &self.projector
    }

    /// Tangent-plane radius of an arbitrary sky position, measured from the pointing
    ///
    /// # Returns
    /// * `Option<Angle>` - None if the position is behind the tangent plane
    pub fn focal_radius(&self, position: &SkyPoint) -> Option<Angle> {
        self.projector
            .project_arcsec(position)
            .map(|(u, v)| Angle::from_arcseconds((u * u + v * v).sqrt()))
    }
}
