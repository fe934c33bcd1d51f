//! Celestial coordinates and the unit-vector operations built on them
//!
//! A `SkyPoint` stores right ascension and declination in radians, the same
//! layout the simulator uses for equatorial coordinates. All of the spherical
//! work (centroids, great-circle offsets, side-of-edge tests) happens on the
//! unit 3-vector returned by [`SkyPoint::to_unit_vector`].

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::{PI, TAU};
use std::fmt;

use crate::units::{Angle, AngleExt};

/// Vectors shorter than this are treated as having no direction
const MIN_DIRECTION_NORM: f64 = 1e-12;

/// A position on the celestial sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPoint {
    /// Right ascension in radians
    pub ra: f64,
    /// Declination in radians
    pub dec: f64,
}

impl SkyPoint {
    /// Create a point from right ascension and declination in radians
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Create a point from right ascension and declination in degrees
    pub fn from_degrees(ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            ra: ra_deg.to_radians(),
            dec: dec_deg.to_radians(),
        }
    }

    pub fn ra_degrees(&self) -> f64 {
        self.ra.to_degrees()
    }

    pub fn dec_degrees(&self) -> f64 {
        self.dec.to_degrees()
    }

    /// True if both coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite()
    }

    /// Unit vector pointing at this position (x toward RA=0 on the equator, z toward the north pole)
    pub fn to_unit_vector(&self) -> Vector3<f64> {
        let cos_dec = self.dec.cos();
        Vector3::new(
            cos_dec * self.ra.cos(),
            cos_dec * self.ra.sin(),
            self.dec.sin(),
        )
    }

    /// Direction of an arbitrary (non-zero) vector
    ///
    /// # Returns
    /// * `Option<SkyPoint>` - None if the vector is too short to define a direction
    pub fn from_vector(v: &Vector3<f64>) -> Option<Self> {
        let norm = v.norm();
        if !norm.is_finite() || norm < MIN_DIRECTION_NORM {
            return None;
        }
        Some(Self::from_unit(&(v / norm)))
    }

    /// Direction of a vector already known to have unit length
    fn from_unit(u: &Vector3<f64>) -> Self {
        let dec = u.z.clamp(-1.0, 1.0).asin();
        let ra = u.y.atan2(u.x).rem_euclid(TAU);
        Self { ra, dec }
    }

    /// Great-circle distance to another point
    pub fn angular_distance(&self, other: &SkyPoint) -> Angle {
        let a = self.to_unit_vector();
        let b = other.to_unit_vector();
        // atan2 form stays accurate for both tiny and near-antipodal separations
        Angle::from_radians(a.cross(&b).norm().atan2(a.dot(&b)))
    }

    /// Right ascension wrapped into `[center_ra - PI, center_ra + PI)`
    ///
    /// Used before taking min/max so that a footprint straddling RA=0 does not
    /// appear to span the whole sky.
    pub fn wrapped_ra(&self, center_ra: f64) -> f64 {
        center_ra + (self.ra - center_ra + PI).rem_euclid(TAU) - PI
    }

    /// Point reached by walking along the great circle toward `toward`
    ///
    /// With `u` this point and `w` the unit tangent toward `toward`, the great
    /// circle is `R(t) = u cos(t) + w sin(t)`; this returns `R(distance)`.
    /// A negative distance walks away from `toward`. If the two points coincide
    /// or are antipodal the direction is undefined and the point is returned
    /// unchanged.
    pub fn great_circle_point(&self, toward: &SkyPoint, distance: Angle) -> SkyPoint {
        let u = self.to_unit_vector();
        let v = toward.to_unit_vector();
        let w = v - u * u.dot(&v);
        let w_norm = w.norm();
        if w_norm < MIN_DIRECTION_NORM {
            return *self;
        }
        let w = w / w_norm;

        let (s, c) = distance.as_radians().sin_cos();
        Self::from_unit(&(u * c + w * s))
    }

    /// Scalar triple product `self . (p2 x p3)`
    pub fn triple(&self, p2: &SkyPoint, p3: &SkyPoint) -> f64 {
        self.to_unit_vector()
            .dot(&p2.to_unit_vector().cross(&p3.to_unit_vector()))
    }
}

impl fmt::Display for SkyPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(RA {:.6}°, Dec {:.6}°)",
            self.ra_degrees(),
            self.dec_degrees()
        )
    }
}

/// Normalized Euclidean mean of the unit vectors of `points`
///
/// This is not a geodesic centroid. For the few-degree fields a focal plane
/// covers the difference is negligible, and downstream bounds are defined
/// relative to this direction.
pub fn mean_direction(points: &[SkyPoint]) -> Option<SkyPoint> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.to_unit_vector());
    SkyPoint::from_vector(&(sum / points.len() as f64))
}

/// Seeded generator of sky positions, uniform in area inside an RA/Dec box
pub struct SkyPointRandomizer {
    rng: StdRng,
}

impl SkyPointRandomizer {
    /// Create a new randomizer with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw a point uniformly (per unit area) from the whole sphere
    pub fn generate(&mut self) -> SkyPoint {
        self.generate_within(0.0, TAU, -PI / 2.0, PI / 2.0)
    }

    /// Draw a point uniformly (per unit area) inside an RA/Dec box given in radians
    pub fn generate_within(
        &mut self,
        min_ra: f64,
        max_ra: f64,
        min_dec: f64,
        max_dec: f64,
    ) -> SkyPoint {
        let ra = min_ra + self.rng.gen::<f64>() * (max_ra - min_ra);
        // Uniform in sin(dec) keeps the density per steradian constant
        let (lo, hi) = (min_dec.sin(), max_dec.sin());
        let dec = (lo + self.rng.gen::<f64>() * (hi - lo)).clamp(-1.0, 1.0).asin();
        SkyPoint::new(ra.rem_euclid(TAU), dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_vector_round_trip() {
        let mut randomizer = SkyPointRandomizer::new(42);
        for _ in 0..100 {
            let p = randomizer.generate();
            let back = SkyPoint::from_vector(&p.to_unit_vector()).unwrap();
            assert_relative_eq!(p.angular_distance(&back).as_arcseconds(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_from_vector_rejects_zero() {
        assert!(SkyPoint::from_vector(&Vector3::zeros()).is_none());
        assert!(SkyPoint::from_vector(&Vector3::new(f64::NAN, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_angular_distance() {
        let a = SkyPoint::from_degrees(10.0, 0.0);
        let b = SkyPoint::from_degrees(20.0, 0.0);
        assert_relative_eq!(a.angular_distance(&b).as_degrees(), 10.0, epsilon = 1e-10);

        let pole = SkyPoint::from_degrees(123.0, 90.0);
        let eq = SkyPoint::from_degrees(45.0, 0.0);
        assert_relative_eq!(pole.angular_distance(&eq).as_degrees(), 90.0, epsilon = 1e-10);
    }

    #[test]
    fn test_wrapped_ra_near_seam() {
        let p = SkyPoint::from_degrees(359.5, 0.0);
        let wrapped = p.wrapped_ra(0.2_f64.to_radians());
        assert_relative_eq!(wrapped.to_degrees(), -0.5, epsilon = 1e-10);

        let q = SkyPoint::from_degrees(0.5, 0.0);
        let wrapped = q.wrapped_ra(359.0_f64.to_radians());
        assert_relative_eq!(wrapped.to_degrees(), 360.5, epsilon = 1e-10);
    }

    #[test]
    fn test_great_circle_point_along_equator() {
        let start = SkyPoint::from_degrees(10.0, 0.0);
        let target = SkyPoint::from_degrees(20.0, 0.0);

        let forward = start.great_circle_point(&target, Angle::from_degrees(3.0));
        assert_relative_eq!(forward.ra_degrees(), 13.0, epsilon = 1e-10);
        assert_relative_eq!(forward.dec_degrees(), 0.0, epsilon = 1e-10);

        let backward = start.great_circle_point(&target, Angle::from_degrees(-3.0));
        assert_relative_eq!(backward.ra_degrees(), 7.0, epsilon = 1e-10);
    }

    #[test]
    fn test_great_circle_point_offset_distance() {
        let corner = SkyPoint::from_degrees(11.0, -9.0);
        let center = SkyPoint::from_degrees(10.5, -9.5);
        let border = Angle::from_arcseconds(60.0);

        let pushed = corner.great_circle_point(&center, -border);
        assert_relative_eq!(
            pushed.angular_distance(&corner).as_arcseconds(),
            60.0,
            epsilon = 1e-6
        );
        let before = corner.angular_distance(&center).as_arcseconds();
        let after = pushed.angular_distance(&center).as_arcseconds();
        assert_relative_eq!(after - before, 60.0, epsilon = 1e-6);
    }

    #[test]
    fn test_great_circle_point_degenerate() {
        let p = SkyPoint::from_degrees(40.0, 20.0);
        let same = p.great_circle_point(&p, Angle::from_degrees(1.0));
        assert_eq!(same, p);
    }

    #[test]
    fn test_triple_sign_tracks_side() {
        let p1 = SkyPoint::from_degrees(0.0, 0.0);
        let p2 = SkyPoint::from_degrees(10.0, 0.0);
        let north = SkyPoint::from_degrees(5.0, 5.0);
        let south = SkyPoint::from_degrees(5.0, -5.0);

        // Moving east along the equator, north is on the left
        assert!(north.triple(&p1, &p2) > 0.0);
        assert!(south.triple(&p1, &p2) < 0.0);
        assert_relative_eq!(
            SkyPoint::from_degrees(5.0, 0.0).triple(&p1, &p2),
            0.0,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_mean_direction_symmetric() {
        let corners = [
            SkyPoint::from_degrees(10.0, -10.0),
            SkyPoint::from_degrees(10.0, -9.0),
            SkyPoint::from_degrees(11.0, -10.0),
            SkyPoint::from_degrees(11.0, -9.0),
        ];
        let center = mean_direction(&corners).unwrap();
        assert_relative_eq!(center.ra_degrees(), 10.5, epsilon = 1e-9);
        assert_relative_eq!(center.dec_degrees(), -9.5, epsilon = 0.01);
    }

    #[test]
    fn test_mean_direction_degenerate() {
        let opposite = [
            SkyPoint::from_degrees(0.0, 0.0),
            SkyPoint::from_degrees(180.0, 0.0),
        ];
        assert!(mean_direction(&opposite).is_none());
        assert!(mean_direction(&[]).is_none());
    }

    #[test]
    fn test_randomizer_reproducible_and_bounded() {
        let mut r1 = SkyPointRandomizer::new(7);
        let mut r2 = SkyPointRandomizer::new(7);
        let (min_ra, max_ra) = (1.0_f64.to_radians(), 2.0_f64.to_radians());
        let (min_dec, max_dec) = ((-5.0_f64).to_radians(), (-4.0_f64).to_radians());

        for _ in 0..200 {
            let a = r1.generate_within(min_ra, max_ra, min_dec, max_dec);
            let b = r2.generate_within(min_ra, max_ra, min_dec, max_dec);
            assert_eq!(a, b);
            assert!(a.ra >= min_ra && a.ra <= max_ra);
            assert!(a.dec >= min_dec - 1e-12 && a.dec <= max_dec + 1e-12);
        }
    }
}
