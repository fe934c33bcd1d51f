//! Gnomonic (tangent-plane) projection about a chosen center
//!
//! The projector builds a local frame at the center: z points at the center,
//! y toward celestial north and x toward increasing right ascension. A sky
//! position is rotated into that frame and divided through by z, so great
//! circles map to straight lines on the plane.
//!
//! East is to the right in this frame (+u toward increasing RA). GalSim's
//! `CelestialCoord.project` puts east to the left, so tangent-plane values
//! passed to GalSim-convention code need u negated, which swaps the roles of
//! the minimum and maximum u bounds.

use nalgebra::{Matrix3, Vector3};

use crate::sky_point::SkyPoint;
use crate::units::{arcsec_to_radians, radians_to_arcsec};

/// Gnomonic projector centered on a sky position
#[derive(Debug, Clone)]
pub struct GnomonicProjector {
    /// Tangent point of the projection
    pub center: SkyPoint,

    /// Rotation matrix from celestial to tangent-frame coordinates (columns are the frame axes)
    rotation_matrix: Matrix3<f64>,
}

impl GnomonicProjector {
    /// Create a projector tangent to the sphere at `center`
    pub fn new(center: &SkyPoint) -> Self {
        let (sin_ra, cos_ra) = center.ra.sin_cos();

        // Z-axis (pointing to center)
        let z = center.to_unit_vector();

        // X-axis toward increasing RA. Written out directly so it stays defined at the poles.
        let east = Vector3::new(-sin_ra, cos_ra, 0.0);

        // Y-axis (towards celestial north)
        let y = z.cross(&east).normalize();
        let x = y.cross(&z).normalize();

        let rotation_matrix = Matrix3::from_columns(&[x, y, z]);

        Self {
            center: *center,
            rotation_matrix,
        }
    }

    /// Project a sky position onto the tangent plane
    ///
    /// # Returns
    /// * `Option<(f64, f64)>` - Plane coordinates (u, v) in radians, None if the
    ///   point is 90 degrees or more from the center
    pub fn project(&self, point: &SkyPoint) -> Option<(f64, f64)> {
        let frame = self.rotation_matrix.transpose() * point.to_unit_vector();

        if frame.z <= 0.0 {
            return None;
        }

        Some((frame.x / frame.z, frame.y / frame.z))
    }

    /// Project a sky position onto the tangent plane, in arcseconds
    pub fn project_arcsec(&self, point: &SkyPoint) -> Option<(f64, f64)> {
        self.project(point)
            .map(|(u, v)| (radians_to_arcsec(u), radians_to_arcsec(v)))
    }

    /// Map tangent-plane coordinates (radians) back onto the sphere
    pub fn deproject(&self, u: f64, v: f64) -> SkyPoint {
        let frame = Vector3::new(u, v, 1.0);
        let world = self.rotation_matrix * frame;
        // The frame vector is never zero, so a direction always exists
        SkyPoint::from_vector(&world).unwrap_or(self.center)
    }

    /// Map tangent-plane coordinates in arcseconds back onto the sphere
    pub fn deproject_arcsec(&self, u_arcsec: f64, v_arcsec: f64) -> SkyPoint {
        self.deproject(arcsec_to_radians(u_arcsec), arcsec_to_radians(v_arcsec))
    }
}
