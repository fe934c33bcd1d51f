//! Bounding boxes on the sky and on the tangent plane
//!
//! Both accumulate min/max values point by point. `RaDecBounds` wraps every
//! right ascension into the branch nearest a reference RA before comparing, so
//! fields that straddle RA = 0 get a narrow range instead of a ~360 degree one.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::sky_point::SkyPoint;

/// Right ascension / declination box, all values in radians
///
/// `min_ra` and `max_ra` live on the branch `[center_ra - PI, center_ra + PI)`
/// so they may fall outside `[0, 2 PI)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaDecBounds {
    /// Reference RA used for wrapping
    pub center_ra: f64,
    pub min_ra: f64,
    pub max_ra: f64,
    pub min_dec: f64,
    pub max_dec: f64,
}

impl RaDecBounds {
    /// Box enclosing all `points`, with RA wrapped relative to `center_ra`
    ///
    /// # Returns
    /// * `Option<RaDecBounds>` - None for an empty slice
    pub fn from_points(points: &[SkyPoint], center_ra: f64) -> Option<Self> {
        let first = points.first()?;
        let first_ra = first.wrapped_ra(center_ra);
        let mut bounds = Self {
            center_ra,
            min_ra: first_ra,
            max_ra: first_ra,
            min_dec: first.dec,
            max_dec: first.dec,
        };
        for p in &points[1..] {
            bounds.include(p);
        }
        Some(bounds)
    }

    /// Grow the box to include `point`
    pub fn include(&mut self, point: &SkyPoint) {
        let ra = point.wrapped_ra(self.center_ra);
        self.min_ra = self.min_ra.min(ra);
        self.max_ra = self.max_ra.max(ra);
        self.min_dec = self.min_dec.min(point.dec);
        self.max_dec = self.max_dec.max(point.dec);
    }

    /// Open the RA range to the full circle and push Dec to the pole(s) given
    ///
    /// Needed when the enclosed region contains a celestial pole, where every
    /// right ascension is present.
    pub fn open_to_pole(&mut self, north: bool, south: bool) {
        self.min_ra = self.center_ra - PI;
        self.max_ra = self.center_ra + PI;
        if north {
            self.max_dec = FRAC_PI_2;
        }
        if south {
            self.min_dec = -FRAC_PI_2;
        }
    }

    /// True if `point` falls inside the box (edges included)
    pub fn contains(&self, point: &SkyPoint) -> bool {
        let ra = point.wrapped_ra(self.center_ra);
        ra >= self.min_ra && ra <= self.max_ra && point.dec >= self.min_dec && point.dec <= self.max_dec
    }

    pub fn min_ra_degrees(&self) -> f64 {
        self.min_ra.to_degrees()
    }

    pub fn max_ra_degrees(&self) -> f64 {
        self.max_ra.to_degrees()
    }

    pub fn min_dec_degrees(&self) -> f64 {
        self.min_dec.to_degrees()
    }

    pub fn max_dec_degrees(&self) -> f64 {
        self.max_dec.to_degrees()
    }
}

/// Rectangle on the tangent plane (arcseconds)
///
/// Starts out undefined and grows as points are included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentBounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Default for TangentBounds {
    fn default() -> Self {
        Self {
            xmin: f64::INFINITY,
            xmax: f64::NEG_INFINITY,
            ymin: f64::INFINITY,
            ymax: f64::NEG_INFINITY,
        }
    }
}

impl TangentBounds {
    /// An undefined rectangle that contains nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Grow to include `(x, y)`; NaN coordinates are ignored
    pub fn include(&mut self, x: f64, y: f64) {
        if x.is_nan() || y.is_nan() {
            return;
        }
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
        self.ymin = self.ymin.min(y);
        self.ymax = self.ymax.max(y);
    }

    /// True once at least one point has been included
    pub fn is_defined(&self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Copy grown by `border` on every side
    pub fn with_border(&self, border: f64) -> Self {
        if !self.is_defined() {
            return *self;
        }
        Self {
            xmin: self.xmin - border,
            xmax: self.xmax + border,
            ymin: self.ymin - border,
            ymax: self.ymax + border,
        }
    }

    pub fn width(&self) -> f64 {
        if self.is_defined() {
            self.xmax - self.xmin
        } else {
            0.0
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_defined() {
            self.ymax - self.ymin
        } else {
            0.0
        }
    }
}
