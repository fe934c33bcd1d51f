use thiserror::Error;

/// Errors raised while building footprints or sky polygons.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// A footprint needs at least three corners.
    #[error("footprint needs at least 3 corners, got {0}")]
    TooFewCorners(usize),

    /// The coordinate service returned flat (Euclidean) positions.
    #[error("world coordinate system is not celestial")]
    NonCelestial,

    /// Corner unit vectors cancel out so no centroid direction exists.
    #[error("corner directions cancel out; footprint centroid is undefined")]
    DegenerateCentroid,

    /// A corner carries NaN or infinite coordinates.
    #[error("non-finite sky coordinate at corner {0}")]
    NonFinite(usize),

    /// A corner is 90 degrees or more from the pointing and has no gnomonic image.
    #[error("corner {0} lies behind the tangent plane")]
    BehindTangentPlane(usize),

    /// The coordinate service could not map a pixel position to the sky.
    #[error("coordinate transform failed: {0}")]
    Transform(String),
}
