//! Point-in-quadrilateral test on the sphere
//!
//! A detector's sky outline is four great-circle edges. To decide whether a
//! candidate position could land on the detector, the corners are first pushed
//! outward from the center by a border margin, then the candidate is checked
//! against an RA/Dec box (cheap) and finally against the sign of the triple
//! product with every directed edge (exact).
//!
//! The world coordinate system may or may not flip handedness, so whether an
//! interior point lies left or right of the edges is not known up front. The
//! test accepts either side as long as all four edges agree.

use log::warn;
use nalgebra::Vector3;

use crate::bounds::RaDecBounds;
use crate::sky_point::{mean_direction, SkyPoint};
use crate::units::Angle;

/// Default margin around a detector, in arcseconds
pub const DEFAULT_BORDER_ARCSEC: f64 = 60.0;

/// Outcome of a containment test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Candidate is left of (or on) every directed edge
    LeftMajority,
    /// Candidate is right of (or on) every directed edge
    RightMajority,
    /// Edges disagree about the side; the candidate is outside
    Outside,
    /// Rejected by the RA/Dec box before the exact test
    OutsideBounds,
    /// The quadrilateral itself is malformed so no decision is possible
    Ambiguous,
}

impl Containment {
    /// True for a definite inside result
    pub fn is_inside(self) -> bool {
        matches!(self, Containment::LeftMajority | Containment::RightMajority)
    }

    /// Whether the candidate should be kept for rendering
    ///
    /// Ambiguous results are kept: a malformed outline must never drop a
    /// possibly-valid object.
    pub fn keep(self) -> bool {
        self.is_inside() || self == Containment::Ambiguous
    }
}

/// One side of a spherical polygon, from `start` to `end`
#[derive(Debug, Clone, Copy)]
pub struct DirectedEdge {
    pub start: SkyPoint,
    pub end: SkyPoint,
    /// `end x start`, so that `p . normal` is the triple product used for the side test
    normal: Vector3<f64>,
}

impl DirectedEdge {
    pub fn new(start: SkyPoint, end: SkyPoint) -> Self {
        let normal = end.to_unit_vector().cross(&start.to_unit_vector());
        Self { start, end, normal }
    }

    /// Signed side of `point` relative to this edge: `point . (end x start)`
    pub fn side(&self, point: &SkyPoint) -> f64 {
        self.side_of_vector(&point.to_unit_vector())
    }

    fn side_of_vector(&self, v: &Vector3<f64>) -> f64 {
        v.dot(&self.normal)
    }

    /// Points of extreme declination strictly inside the arc, if any
    ///
    /// A great-circle arc between two points at similar declination bows
    /// toward the nearer pole, so its Dec range can exceed that of its end
    /// points. Right ascension is monotonic along an arc that does not cross a
    /// pole, so RA extremes are always at the end points.
    fn declination_extremes(&self) -> Vec<SkyPoint> {
        let a = self.start.to_unit_vector();
        let b = self.end.to_unit_vector();
        let n = a.cross(&b);
        let n_norm = n.norm();
        if n_norm < 1e-15 {
            return Vec::new();
        }
        let n = n / n_norm;

        // Highest point on the full great circle: the pole projected into its plane
        let z = Vector3::new(0.0, 0.0, 1.0);
        let top = z - n * n.dot(&z);
        let top_norm = top.norm();
        if top_norm < 1e-15 {
            // Great circle is the equator; declination is constant
            return Vec::new();
        }
        let top = top / top_norm;

        [top, -top]
            .into_iter()
            .filter(|q| a.cross(q).dot(&n) > 0.0 && q.cross(&b).dot(&n) > 0.0)
            .filter_map(|q| SkyPoint::from_vector(&q))
            .collect()
    }
}

/// Convex spherical quadrilateral grown by a border margin
#[derive(Debug, Clone)]
pub struct SkyQuad {
    center: SkyPoint,
    corners: [SkyPoint; 4],
    edges: [DirectedEdge; 4],
    bounds: RaDecBounds,
    well_formed: bool,
}

impl SkyQuad {
    /// Build from four corners in perimeter order, centered on their mean direction
    ///
    /// When the corners have no mean direction the first corner stands in as
    /// the center and a warning is logged; the border expansion is then skewed.
    pub fn from_corners(corners: [SkyPoint; 4], border: Angle) -> Self {
        let center = match mean_direction(&corners) {
            Some(center) => center,
            None => {
                warn!(
                    "Sky quadrilateral with corners {} {} {} {} has no mean direction; using {} as its center",
                    corners[0], corners[1], corners[2], corners[3], corners[0]
                );
                corners[0]
            }
        };
        Self::with_center(corners, center, border)
    }

    /// Build from four corners in perimeter order and an explicit center
    ///
    /// Each corner is moved away from `center` by `border` along the great
    /// circle joining them, which grows the region by a fixed angular buffer
    /// without changing its shape.
    pub fn with_center(corners: [SkyPoint; 4], center: SkyPoint, border: Angle) -> Self {
        let corners = corners.map(|c| c.great_circle_point(&center, -border));
        let edges = [
            DirectedEdge::new(corners[0], corners[1]),
            DirectedEdge::new(corners[1], corners[2]),
            DirectedEdge::new(corners[2], corners[3]),
            DirectedEdge::new(corners[3], corners[0]),
        ];

        let well_formed = Self::check_convex(&corners, &edges);
        if !well_formed {
            warn!(
                "Sky quadrilateral with corners {} {} {} {} is not convex; containment is undecidable",
                corners[0], corners[1], corners[2], corners[3]
            );
        }

        let mut bounds = RaDecBounds {
            center_ra: center.ra,
            min_ra: center.wrapped_ra(center.ra),
            max_ra: center.wrapped_ra(center.ra),
            min_dec: center.dec,
            max_dec: center.dec,
        };
        for corner in &corners {
            bounds.include(corner);
        }
        for edge in &edges {
            for extreme in edge.declination_extremes() {
                bounds.include(&extreme);
            }
        }

        let mut quad = Self {
            center,
            corners,
            edges,
            bounds,
            well_formed,
        };

        if well_formed {
            let north = quad.exact_test(&Vector3::new(0.0, 0.0, 1.0)).is_inside();
            let south = quad.exact_test(&Vector3::new(0.0, 0.0, -1.0)).is_inside()
                && quad.center.dec < 0.0;
            let north = north && quad.center.dec > 0.0;
            if north || south {
                quad.bounds.open_to_pole(north, south);
            }
        }

        quad
    }

    /// Every corner must sit strictly on one common side of each edge it is not part of
    fn check_convex(corners: &[SkyPoint; 4], edges: &[DirectedEdge; 4]) -> bool {
        let mut signs = Vec::with_capacity(8);
        for (i, edge) in edges.iter().enumerate() {
            for offset in [2, 3] {
                signs.push(edge.side(&corners[(i + offset) % 4]));
            }
        }
        signs.iter().all(|s| *s > 0.0) || signs.iter().all(|s| *s < 0.0)
    }

    pub fn center(&self) -> SkyPoint {
        self.center
    }

    /// Corners after the border expansion
    pub fn corners(&self) -> &[SkyPoint; 4] {
        &self.corners
    }

    pub fn edges(&self) -> &[DirectedEdge; 4] {
        &self.edges
    }

    /// Box used for trivial rejection
    pub fn bounds(&self) -> &RaDecBounds {
        &self.bounds
    }

    pub fn is_well_formed(&self) -> bool {
        self.well_formed
    }

    /// Classify `candidate` relative to the expanded quadrilateral
    pub fn contains(&self, candidate: &SkyPoint) -> Containment {
        if !self.well_formed {
            return Containment::Ambiguous;
        }
        if !self.bounds.contains(candidate) {
            return Containment::OutsideBounds;
        }
        self.exact_test(&candidate.to_unit_vector())
    }

    fn exact_test(&self, v: &Vector3<f64>) -> Containment {
        let mut any_left = false;
        let mut any_right = false;
        for edge in &self.edges {
            let side = edge.side_of_vector(v);
            if side > 0.0 {
                any_left = true;
            } else if side < 0.0 {
                any_right = true;
            }
        }
        match (any_left, any_right) {
            (true, true) => Containment::Outside,
            (false, true) => Containment::RightMajority,
            // All zero only happens for a degenerate quad; treat as on the boundary
            _ => Containment::LeftMajority,
        }
    }

    /// Skip mask for a list of candidate positions (`true` = skip rendering)
    pub fn prune(&self, positions: &[SkyPoint]) -> Vec<bool> {
        positions.iter().map(|p| !self.contains(p).keep()).collect()
    }
}
