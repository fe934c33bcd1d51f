//! Type-safe angular units for sky geometry
//!
//! Angles cross module boundaries as `uom` quantities so that border margins,
//! radii and offsets can't be mixed up between degrees, radians and
//! arcseconds. Internally the math works on raw radians.

use uom::si::angle::{degree, radian};

/// Type alias for plane angles with convenient methods
pub type Angle = uom::si::f64::Angle;

/// Arcseconds per degree
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Extension trait for the angle conversions used on the sky
pub trait AngleExt {
    /// Create angle from radians
    fn from_radians(rad: f64) -> Self;

    /// Get angle in radians
    fn as_radians(&self) -> f64;

    /// Create angle from degrees
    fn from_degrees(deg: f64) -> Self;

    /// Get angle in degrees
    fn as_degrees(&self) -> f64;

    /// Create angle from arcseconds
    fn from_arcseconds(arcsec: f64) -> Self;

    /// Get angle in arcseconds
    fn as_arcseconds(&self) -> f64;
}

impl AngleExt for Angle {
    fn from_radians(rad: f64) -> Self {
        Angle::new::<radian>(rad)
    }

    fn as_radians(&self) -> f64 {
        self.get::<radian>()
    }

    fn from_degrees(deg: f64) -> Self {
        Angle::new::<degree>(deg)
    }

    fn as_degrees(&self) -> f64 {
        self.get::<degree>()
    }

    fn from_arcseconds(arcsec: f64) -> Self {
        Angle::new::<degree>(arcsec / ARCSEC_PER_DEGREE)
    }

    fn as_arcseconds(&self) -> f64 {
        self.get::<degree>() * ARCSEC_PER_DEGREE
    }
}

/// Convert radians to arcseconds
pub fn radians_to_arcsec(rad: f64) -> f64 {
    rad.to_degrees() * ARCSEC_PER_DEGREE
}

/// Convert arcseconds to radians
pub fn arcsec_to_radians(arcsec: f64) -> f64 {
    (arcsec / ARCSEC_PER_DEGREE).to_radians()
}
